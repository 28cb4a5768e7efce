#![forbid(unsafe_code)]

//! Identity-keyed component table.
//!
//! Every element gets a [`ComponentId`] at creation and an entry in the
//! runtime's [`ComponentRegistry`]. Scheduled work refers to components by
//! id and looks them up when it runs, so a task never keeps a component
//! alive. Entries are removed explicitly on teardown; an entry whose
//! element was dropped without teardown is pruned on the next lookup.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

static COMPONENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(COMPONENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Weak table from [`ComponentId`] to component state.
pub struct ComponentRegistry<T> {
    entries: RefCell<AHashMap<ComponentId, Weak<T>>>,
}

impl<T> ComponentRegistry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(AHashMap::new()),
        }
    }

    /// Register `component` under `id`, replacing any previous entry.
    pub fn insert(&self, id: ComponentId, component: &Rc<T>) {
        self.entries.borrow_mut().insert(id, Rc::downgrade(component));
    }

    /// Look up a live component. Dead entries are pruned.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<Rc<T>> {
        let found = self.entries.borrow().get(&id).map(Weak::upgrade);
        match found {
            Some(Some(component)) => Some(component),
            Some(None) => {
                self.entries.borrow_mut().remove(&id);
                None
            }
            None => None,
        }
    }

    /// Evict `id`. Returns whether an entry existed.
    pub fn remove(&self, id: ComponentId) -> bool {
        self.entries.borrow_mut().remove(&id).is_some()
    }

    /// Whether `id` is registered, live or not.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    /// Number of entries, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Live components, in unspecified order.
    #[must_use]
    pub fn live(&self) -> Vec<Rc<T>> {
        self.entries.borrow().values().filter_map(Weak::upgrade).collect()
    }
}

impl<T> Default for ComponentRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ComponentRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("len", &self.len())
            .finish()
    }
}
