#![forbid(unsafe_code)]

//! The capabilities a concrete component supplies to the runtime.
//!
//! A component is assembled from two small traits instead of a base class:
//!
//! - [`AttributeHost`]: raw access to the host's HTML attributes, bypassing
//!   property synchronization.
//! - [`Renderable`]: the render entry point.
//!
//! Anything implementing both is a [`Component`]. [`AttributeMap`] is a
//! ready-made attribute store for hosts that are not backed by a DOM.

use std::cell::RefCell;

use elementa_core::ChangeType;
use indexmap::IndexMap;

use crate::element::Element;

/// Raw attribute access on the host node.
///
/// The runtime calls the `_raw` methods when reflecting a property onto its
/// attribute, so reflection never loops back into attribute sync.
pub trait AttributeHost {
    /// Current attribute value, `None` when absent.
    fn get_attribute(&self, name: &str) -> Option<String>;

    /// Set an attribute without triggering property sync.
    fn set_attribute_raw(&self, name: &str, value: &str);

    /// Remove an attribute without triggering property sync.
    fn remove_attribute_raw(&self, name: &str);

    /// Whether the attribute is present.
    fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Whether the component already owns a member named `key`. A
    /// reflect-to-self accessor is never installed over an owned member.
    fn has_own_property(&self, key: &str) -> bool {
        let _ = key;
        false
    }
}

/// The render entry point.
pub trait Renderable {
    /// Re-render for the categories in `change`. Must be idempotent; the
    /// runtime may call it with categories nothing actually depends on.
    fn render_to_dom(&self, element: &Element, change: ChangeType);
}

/// A complete component: attributes plus rendering.
pub trait Component: AttributeHost + Renderable {}

impl<T: AttributeHost + Renderable + ?Sized> Component for T {}

/// In-memory attribute store, insertion-ordered.
#[derive(Debug, Default)]
pub struct AttributeMap {
    attributes: RefCell<IndexMap<String, String>>,
}

impl AttributeMap {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with initial attributes.
    #[must_use]
    pub fn with<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let attributes = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            attributes: RefCell::new(attributes),
        }
    }

    /// Every attribute as `(name, value)`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.attributes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl AttributeHost for AttributeMap {
    fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    fn set_attribute_raw(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
    }

    fn remove_attribute_raw(&self, name: &str) {
        self.attributes.borrow_mut().shift_remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_map_round_trips() {
        let map = AttributeMap::with([("a", "1")]);
        assert_eq!(map.get_attribute("a").as_deref(), Some("1"));
        map.set_attribute_raw("b", "");
        assert!(map.has_attribute("b"));
        map.remove_attribute_raw("a");
        assert_eq!(map.snapshot(), vec![("b".to_owned(), String::new())]);
        assert!(!map.has_own_property("a"));
    }
}
