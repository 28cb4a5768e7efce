#![forbid(unsafe_code)]

//! Single-threaded task queue.
//!
//! Stands in for the browser's zero-delay timer: work posted during a
//! synchronous turn runs on the next [`TaskQueue::flush`]. Tasks posted
//! while a flush is running belong to the next turn of the same flush.
//!
//! # Invariants
//!
//! 1. Tasks run in posting order.
//! 2. No task runs re-entrantly inside another task's `post`.
//! 3. A flush stops after `max_turns` turns even if work remains; the
//!    remainder stays queued.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

type Task = Box<dyn FnOnce()>;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Turns drained.
    pub turns: usize,
    /// Tasks run.
    pub tasks: usize,
    /// Whether the turn limit stopped the flush with work still queued.
    pub truncated: bool,
}

/// FIFO queue of deferred tasks.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next turn.
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued work turn by turn until the queue is empty or `max_turns`
    /// turns have run.
    pub fn flush(&self, max_turns: usize) -> FlushStats {
        let mut stats = FlushStats::default();
        while stats.turns < max_turns {
            let turn: VecDeque<Task> = std::mem::take(&mut *self.tasks.borrow_mut());
            if turn.is_empty() {
                return stats;
            }
            stats.turns += 1;
            for task in turn {
                task();
                stats.tasks += 1;
            }
        }
        stats.truncated = !self.is_empty();
        if stats.truncated {
            tracing::warn!(
                turns = stats.turns,
                remaining = self.len(),
                "flush stopped at turn limit; renders keep scheduling renders"
            );
        }
        stats
    }

    /// Drop every queued task without running it.
    pub fn clear(&self) {
        self.tasks.borrow_mut().clear();
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[test]
    fn tasks_run_in_posting_order() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let sink = Rc::clone(&log);
            queue.post(move || sink.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        let stats = queue.flush(8);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(stats, FlushStats { turns: 1, tasks: 3, truncated: false });
    }

    #[test]
    fn tasks_posted_during_flush_run_next_turn() {
        let queue = Rc::new(TaskQueue::new());
        let hits = Rc::new(Cell::new(0));
        let q = Rc::clone(&queue);
        let h = Rc::clone(&hits);
        queue.post(move || {
            let h2 = Rc::clone(&h);
            q.post(move || h2.set(h2.get() + 1));
        });
        let stats = queue.flush(8);
        assert_eq!(hits.get(), 1);
        assert_eq!(stats.turns, 2);
    }

    #[test]
    #[traced_test]
    fn runaway_work_stops_at_turn_limit() {
        fn repost(queue: &Rc<TaskQueue>) {
            let q = Rc::clone(queue);
            queue.post(move || repost(&q));
        }
        let queue = Rc::new(TaskQueue::new());
        repost(&queue);
        let stats = queue.flush(4);
        assert!(stats.truncated);
        assert_eq!(stats.turns, 4);
        assert_eq!(queue.len(), 1);
        assert!(logs_contain("flush stopped at turn limit"));
        queue.clear();
    }
}
