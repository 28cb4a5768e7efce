#![forbid(unsafe_code)]

//! Render request bookkeeping.
//!
//! [`RenderScheduler`] holds at most one pending [`RenderRequest`] per
//! component. Requests made while one is pending are merged into it: the
//! change masks are OR-ed and the triggering keys are appended without
//! duplicates. The runtime posts exactly one task when a request is
//! created and takes the request back when that task fires.
//!
//! # Invariants
//!
//! 1. At most one pending request, and so one posted task, per component.
//! 2. A request is removed before the render body runs, so work scheduled
//!    by the render creates a fresh request.
//! 3. The merged mask equals the OR of every merged change.

use std::cell::RefCell;

use ahash::AHashMap;
use elementa_core::ChangeType;
use indexmap::IndexSet;

use crate::registry::ComponentId;

/// Accumulated work for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    /// OR of every change category requested.
    pub change: ChangeType,
    /// Property or prop keys that triggered the request, first-seen order.
    pub keys: IndexSet<String>,
}

impl RenderRequest {
    fn merge(&mut self, change: ChangeType, key: Option<&str>) {
        self.change |= change;
        if let Some(key) = key {
            if !self.keys.contains(key) {
                self.keys.insert(key.to_owned());
            }
        }
    }
}

/// Pending render requests keyed by component.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: RefCell<AHashMap<ComponentId, RenderRequest>>,
}

impl RenderScheduler {
    /// No pending requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `change` for `id`. Returns `true` when this created a new
    /// request, meaning the caller must post the render task.
    pub fn request(&self, id: ComponentId, change: ChangeType, key: Option<&str>) -> bool {
        let mut pending = self.pending.borrow_mut();
        let created = !pending.contains_key(&id);
        pending.entry(id).or_default().merge(change, key);
        created
    }

    /// Remove and return the pending request for `id`.
    pub fn take(&self, id: ComponentId) -> Option<RenderRequest> {
        self.pending.borrow_mut().remove(&id)
    }

    /// The pending mask for `id`, if any.
    #[must_use]
    pub fn pending_change(&self, id: ComponentId) -> Option<ChangeType> {
        self.pending.borrow().get(&id).map(|r| r.change)
    }

    /// Whether `id` has a pending request.
    #[must_use]
    pub fn is_pending(&self, id: ComponentId) -> bool {
        self.pending.borrow().contains_key(&id)
    }

    /// Number of components with pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn change_strategy() -> impl Strategy<Value = ChangeType> {
        prop::sample::select(vec![
            ChangeType::PROP,
            ChangeType::THEME,
            ChangeType::LANG,
            ChangeType::SUBTREE_PROPS,
            ChangeType::GLOBAL_PROPS,
        ])
    }

    #[test]
    fn second_request_merges() {
        let scheduler = RenderScheduler::new();
        let id = ComponentId::next();
        assert!(scheduler.request(id, ChangeType::PROP, Some("a")));
        assert!(!scheduler.request(id, ChangeType::THEME, None));
        assert!(!scheduler.request(id, ChangeType::PROP, Some("a")));
        assert!(!scheduler.request(id, ChangeType::PROP, Some("b")));

        let request = scheduler.take(id).unwrap();
        assert_eq!(request.change, ChangeType::PROP | ChangeType::THEME);
        assert_eq!(request.keys.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(!scheduler.is_pending(id));
    }

    #[test]
    fn take_clears_so_next_request_is_fresh() {
        let scheduler = RenderScheduler::new();
        let id = ComponentId::next();
        scheduler.request(id, ChangeType::LANG, None);
        scheduler.take(id);
        assert!(scheduler.request(id, ChangeType::PROP, None));
        assert_eq!(scheduler.pending_change(id), Some(ChangeType::PROP));
    }

    #[test]
    fn components_are_independent() {
        let scheduler = RenderScheduler::new();
        let (a, b) = (ComponentId::next(), ComponentId::next());
        assert!(scheduler.request(a, ChangeType::PROP, None));
        assert!(scheduler.request(b, ChangeType::THEME, None));
        assert_eq!(scheduler.len(), 2);
    }

    proptest! {
        #[test]
        fn merged_mask_is_or_of_requests(changes in prop::collection::vec(change_strategy(), 1..32)) {
            let scheduler = RenderScheduler::new();
            let id = ComponentId::next();
            let created: Vec<bool> = changes
                .iter()
                .map(|c| scheduler.request(id, *c, None))
                .collect();
            prop_assert_eq!(created.iter().filter(|c| **c).count(), 1);
            let expected = changes.iter().fold(ChangeType::empty(), |acc, c| acc | *c);
            prop_assert_eq!(scheduler.take(id).map(|r| r.change), Some(expected));
        }
    }
}
