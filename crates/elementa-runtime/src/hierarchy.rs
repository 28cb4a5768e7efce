#![forbid(unsafe_code)]

//! Parent/child links and the values they carry.
//!
//! Elements form a tree. Three kinds of value travel along it:
//!
//! | Kind | Stored on | Visible to | Change re-renders |
//! |------|-----------|------------|-------------------|
//! | global prop | the root | every element of the tree | whole tree, [`ChangeType::GLOBAL_PROPS`] |
//! | subtree prop | the setting element | it and its descendants | that subtree, [`ChangeType::SUBTREE_PROPS`] |
//! | reference | the registering element | descendants, via complex attributes | nothing |
//!
//! A subtree prop lookup walks from the element towards the root and
//! returns the nearest value. A reference is a generated attribute string
//! starting with [`REF_PREFIX`]; a descendant whose complex attribute holds
//! it receives the registered value itself instead of a decoded copy.
//!
//! Reparenting does not re-render: inherited values are read at render
//! time.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use elementa_core::prop::REF_PREFIX;
use elementa_core::{ChangeType, Value};
use indexmap::IndexMap;

use crate::element::{Element, ElementInner, ElementState};
use crate::error::HierarchyError;

static REF_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Element {
    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Append `child`, detaching it from any previous parent.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::Cycle`] if `child` is `self` or an ancestor of it,
    /// [`HierarchyError::Detached`] if either element was torn down.
    pub fn append_child(&self, child: &Element) -> Result<(), HierarchyError> {
        if self.is_torn_down() || child.is_torn_down() {
            return Err(HierarchyError::Detached);
        }
        if self.ancestors_and_self().any(|el| el == *child) {
            return Err(HierarchyError::Cycle);
        }
        if let Some(old) = child.parent() {
            old.remove_child(child);
        }
        child.inner.state.borrow_mut().parent = Some(Rc::downgrade(&self.inner));
        self.inner
            .state
            .borrow_mut()
            .children
            .push(Rc::downgrade(&child.inner));
        tracing::trace!(parent = %self.id(), child = %child.id(), "child appended");
        Ok(())
    }

    /// Detach `child`. Returns whether it was a child of `self`.
    pub fn remove_child(&self, child: &Element) -> bool {
        let target = Rc::as_ptr(&child.inner);
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.children.len();
            state.children.retain(|w| !std::ptr::eq(w.as_ptr(), target));
            state.children.len() != before
        };
        if removed {
            child.inner.state.borrow_mut().parent = None;
        }
        removed
    }

    /// The parent element, if attached and alive.
    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        let parent = self.inner.state.borrow().parent.clone()?;
        parent.upgrade().map(Element::from_inner)
    }

    /// Live children in insertion order.
    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .filter_map(std::rc::Weak::upgrade)
            .map(Element::from_inner)
            .collect()
    }

    /// The topmost ancestor, or `self`.
    #[must_use]
    pub fn root(&self) -> Element {
        self.ancestors_and_self().last().unwrap_or_else(|| self.clone())
    }

    /// `self` and every descendant, depth first, parents before children.
    #[must_use]
    pub fn subtree(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(el) = stack.pop() {
            let mut children = el.children();
            children.reverse();
            stack.extend(children);
            out.push(el);
        }
        out
    }

    fn ancestors_and_self(&self) -> impl Iterator<Item = Element> {
        std::iter::successors(Some(self.clone()), Element::parent)
    }

    // -----------------------------------------------------------------------
    // Global props
    // -----------------------------------------------------------------------

    /// Set a value shared by the whole tree. Returns whether it changed;
    /// when it did, every element of the tree re-renders.
    pub fn set_global_prop(&self, key: &str, value: impl Into<Value>) -> bool {
        let root = self.root();
        let value = value.into();
        if !store(&root.inner, key, value, |s| &mut s.global_props) {
            return false;
        }
        tracing::debug!(root = %root.id(), key, "global prop changed");
        for el in root.subtree() {
            el.request_render(ChangeType::GLOBAL_PROPS);
        }
        true
    }

    /// Read a global prop; `undefined` if unset.
    #[must_use]
    pub fn global_prop(&self, key: &str) -> Value {
        let root = self.root();
        let state = root.inner.state.borrow();
        state.global_props.get(key).cloned().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Subtree props
    // -----------------------------------------------------------------------

    /// Set a value visible to `self` and its descendants. Returns whether
    /// it changed; when it did, the subtree re-renders.
    pub fn set_subtree_prop(&self, key: &str, value: impl Into<Value>) -> bool {
        if !store(&self.inner, key, value.into(), |s| &mut s.subtree_props) {
            return false;
        }
        self.subtree_changed(key);
        true
    }

    /// Remove a subtree prop set on `self`. Returns whether one was set.
    pub fn remove_subtree_prop(&self, key: &str) -> bool {
        let removed = self
            .inner
            .state
            .borrow_mut()
            .subtree_props
            .shift_remove(key)
            .is_some();
        if removed {
            self.subtree_changed(key);
        }
        removed
    }

    /// The nearest subtree prop named `key`, looking at `self` first and
    /// then each ancestor; `undefined` if none has it.
    #[must_use]
    pub fn subtree_prop(&self, key: &str) -> Value {
        self.ancestors_and_self()
            .find_map(|el| el.inner.state.borrow().subtree_props.get(key).cloned())
            .unwrap_or_default()
    }

    fn subtree_changed(&self, key: &str) {
        tracing::debug!(component = %self.id(), key, "subtree prop changed");
        for el in self.subtree() {
            el.request_render(ChangeType::SUBTREE_PROPS);
        }
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Register `value` for descendants and return the attribute text that
    /// refers to it.
    pub fn register_ref(&self, value: impl Into<Value>) -> String {
        let name = format!("{REF_PREFIX}{}", REF_COUNTER.fetch_add(1, Ordering::Relaxed));
        self.inner
            .state
            .borrow_mut()
            .refs
            .insert(name.clone(), value.into());
        name
    }

    /// Drop a registered reference. Returns whether it existed.
    pub fn unregister_ref(&self, name: &str) -> bool {
        self.inner.state.borrow_mut().refs.remove(name).is_some()
    }

    /// Resolve a reference registered by an ancestor, nearest first.
    #[must_use]
    pub fn resolve_ref(&self, name: &str) -> Option<Value> {
        std::iter::successors(self.parent(), Element::parent)
            .find_map(|el| el.inner.state.borrow().refs.get(name).cloned())
    }
}

/// Insert into one of the element's maps. Returns `false` when `value` is
/// the same as the stored one.
fn store(
    inner: &ElementInner,
    key: &str,
    value: Value,
    map: impl FnOnce(&mut ElementState) -> &mut IndexMap<String, Value>,
) -> bool {
    let mut state = inner.state.borrow_mut();
    let map = map(&mut *state);
    if map.get(key).is_some_and(|old| old.same(&value)) {
        return false;
    }
    map.insert(key.to_owned(), value);
    true
}
