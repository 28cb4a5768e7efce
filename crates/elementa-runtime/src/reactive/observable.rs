#![forbid(unsafe_code)]

//! Observable values and subscriber lists.
//!
//! [`Subscribers<A>`] is a list of callbacks taking `&A`. Callbacks are held
//! weakly; the strong reference lives in the [`Subscription`] handed back to
//! the caller, so dropping the subscription unsubscribes. Element event
//! listeners and [`Observable`] share this machinery.
//!
//! # Invariants
//!
//! 1. Subscribers are called in registration order.
//! 2. A dropped [`Subscription`] is never called again.
//! 3. `Observable::set` with an equal value is a no-op: no version bump, no
//!    notification.
//!
//! # Failure Modes
//!
//! - A callback may subscribe or set values re-entrantly: the callback list
//!   is snapshotted before any callback runs. Subscribers added during a
//!   notification are first called on the next one.
//! - Dead entries are pruned lazily on the next emit.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = Rc<dyn Fn(&A)>;

/// Weakly held callbacks taking `&A`.
pub struct Subscribers<A: ?Sized> {
    entries: RefCell<Vec<Weak<dyn Fn(&A)>>>,
}

impl<A: ?Sized + 'static> Subscribers<A> {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Register `callback` until the returned guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&A) + 'static) -> Subscription {
        let strong: Callback<A> = Rc::new(callback);
        self.entries.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Call every live subscriber with `arg`. Returns how many were called.
    pub fn emit(&self, arg: &A) -> usize {
        let live: Vec<Callback<A>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|w| w.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in &live {
            callback(arg);
        }
        live.len()
    }

    /// Number of registered entries, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl<A: ?Sized + 'static> Default for Subscribers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for Subscribers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct ObservableInner<T> {
    value: RefCell<T>,
    version: std::cell::Cell<u64>,
    subscribers: Subscribers<T>,
}

/// A shared, versioned value that notifies subscribers when it changes.
///
/// Clones share the same value and subscribers.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// A new observable at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: std::cell::Cell::new(0),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// A clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Returns whether it changed; subscribers are
    /// notified only when it did.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        let snapshot = self.get();
        self.inner.subscribers.emit(&snapshot);
        true
    }

    /// Subscribe to changes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }

    /// Incremented once per changing [`Observable::set`].
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_bumps_version_only_on_change() {
        let obs = Observable::new(1);
        assert!(!obs.set(1));
        assert_eq!(obs.version(), 0);
        assert!(obs.set(2));
        assert_eq!(obs.version(), 1);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn subscribers_see_new_value_in_order() {
        let obs = Observable::new(String::from("light"));
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&log);
        let second = Rc::clone(&log);
        let _a = obs.subscribe(move |v| first.borrow_mut().push(format!("a:{v}")));
        let _b = obs.subscribe(move |v| second.borrow_mut().push(format!("b:{v}")));
        obs.set("dark".into());
        assert_eq!(*log.borrow(), vec!["a:dark", "b:dark"]);
    }

    #[test]
    fn dropped_subscription_is_not_called() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| counter.set(counter.get() + 1));
        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn reentrant_subscribe_is_deferred_to_next_emit() {
        let list: Rc<Subscribers<u8>> = Rc::new(Subscribers::new());
        let hits = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::default();

        let inner_list = Rc::clone(&list);
        let inner_hits = Rc::clone(&hits);
        let inner_held = Rc::clone(&held);
        let _outer = list.subscribe(move |_| {
            let counter = Rc::clone(&inner_hits);
            let sub = inner_list.subscribe(move |_| counter.set(counter.get() + 1));
            inner_held.borrow_mut().push(sub);
        });

        assert_eq!(list.emit(&0), 1);
        assert_eq!(hits.get(), 0);
        list.emit(&0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsized_arguments() {
        let list: Subscribers<str> = Subscribers::new();
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&seen);
        let _sub = list.subscribe(move |s: &str| sink.borrow_mut().push_str(s));
        list.emit("hello");
        assert_eq!(*seen.borrow(), "hello");
    }

    #[test]
    fn debug_shows_value_and_subscribers() {
        let theme = Observable::new(String::from("dark"));
        let _sub = theme.subscribe(|_| {});
        assert_eq!(
            format!("{theme:?}"),
            r#"Observable { value: "dark", version: 0, subscribers: 1 }"#
        );
    }
}
