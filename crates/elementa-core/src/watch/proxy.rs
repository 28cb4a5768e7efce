#![forbid(unsafe_code)]

//! Watched handles: explicit write interception for nested values.
//!
//! A [`Watched`] pairs a [`Value`] with a watch mode and a notify callback.
//! All container writes go through it; the handle applies the write and
//! then decides whether the write is relevant.
//!
//! # Modes
//!
//! | Mode | Built from | Relevant writes |
//! |------|------------|-----------------|
//! | `Deep` | `**` pattern, or blanket `watch` without paths | every write at every depth |
//! | `Tree` | explicit watch paths | writes whose member (or `*` sibling) watches its own level |
//! | `Inert` | no watching, exhausted subtree, opaque leaf | none |
//!
//! Children are wrapped lazily: [`Watched::get`] derives the child's mode
//! from the current one, so a value assigned later is watched as soon as it
//! is read back through the handle.
//!
//! # Invariants
//!
//! 1. Notify fires only when the written value is not the
//!    [same](Value::same) as the previous one.
//! 2. Deleting a member that does not exist never notifies.
//! 3. Dates and regular expressions are never descended into.
//! 4. On arrays only index writes are structural. `length` resizes
//!    silently; other names are ignored.
//! 5. An array element holding `undefined` is a hole. Deleting it never
//!    notifies, whether the hole came from growth, a delete, or an
//!    explicit `undefined` write.
//!
//! # Failure Modes
//!
//! - Writing into a non-container is a no-op returning `false`.
//! - An array write or resize that would exceed
//!   [`MAX_ARRAY_LENGTH`](crate::value::MAX_ARRAY_LENGTH) or open more than
//!   [`MAX_HOLE_RUN`](crate::value::MAX_HOLE_RUN) holes is ignored and
//!   returns `false`.
//! - A notify callback that panics propagates to the writer.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::path::{WatchMap, WatchTree};
use crate::value::{Key, Value};

/// Callback invoked with the full key path of a relevant write.
pub type Notify = Rc<dyn Fn(&[Key])>;

/// The array member name that resizes without notifying.
const LENGTH: &str = "length";

#[derive(Clone)]
enum Mode {
    Inert,
    Deep,
    Tree(Rc<WatchMap>),
}

/// A value handle whose writes are reported to a watcher.
#[derive(Clone)]
pub struct Watched {
    value: Value,
    mode: Mode,
    notify: Option<Notify>,
    path: Vec<Key>,
}

impl Watched {
    /// Watch `value` according to `tree`.
    pub fn new(value: Value, tree: &WatchTree, notify: Notify) -> Self {
        let mode = match tree {
            WatchTree::Deep => Mode::Deep,
            WatchTree::Paths(map) if map.is_empty() => Mode::Inert,
            WatchTree::Paths(map) => Mode::Tree(Rc::clone(map)),
        };
        Self {
            value,
            mode,
            notify: Some(notify),
            path: Vec::new(),
        }
    }

    /// Watch every write below `value`.
    pub fn deep(value: Value, notify: Notify) -> Self {
        Self::new(value, &WatchTree::Deep, notify)
    }

    /// A handle that applies writes but never notifies.
    #[must_use]
    pub fn inert(value: Value) -> Self {
        Self {
            value,
            mode: Mode::Inert,
            notify: None,
            path: Vec::new(),
        }
    }

    /// The wrapped value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Unwrap into the raw value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Key path from the watched root to this handle.
    #[must_use]
    pub fn path(&self) -> &[Key] {
        &self.path
    }

    /// Whether writes through this handle can notify.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        !matches!(self.mode, Mode::Inert) && self.value.is_watchable()
    }

    /// Child handle for member `key`.
    pub fn get(&self, key: impl Into<Key>) -> Self {
        let key = key.into();
        let child = self.value.get(&key);
        let mode = if child.is_watchable() {
            match &self.mode {
                Mode::Inert => Mode::Inert,
                Mode::Deep => Mode::Deep,
                Mode::Tree(map) => map.child(&key.segment()).map_or(Mode::Inert, Mode::Tree),
            }
        } else {
            Mode::Inert
        };
        let mut path = self.path.clone();
        path.push(key);
        Self {
            value: child,
            mode,
            notify: self.notify.clone(),
            path,
        }
    }

    /// Follow a dotted path of member names.
    pub fn get_path(&self, path: &str) -> Self {
        path.split('.')
            .filter(|seg| !seg.is_empty())
            .fold(self.clone(), |cur, seg| cur.get(seg))
    }

    /// Write member `key`. Returns whether the watcher was notified.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let previous = match &self.value {
            Value::Array(arr) => match key.as_index() {
                Some(index) => match arr.write(index, value.clone()) {
                    Some(previous) => previous,
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(index, len = arr.len(), "array write out of range ignored");
                        return false;
                    }
                },
                None => {
                    if key.segment() == LENGTH {
                        if let Some(len) = as_length(&value) {
                            self.set_len(len);
                        }
                    }
                    return false;
                }
            },
            Value::Object(obj) => obj.write(&key.segment(), value.clone()).unwrap_or_default(),
            _ => return false,
        };
        if previous.same(&value) {
            return false;
        }
        self.report(key)
    }

    /// Delete member `key`. Returns whether the watcher was notified.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let existed = match &self.value {
            Value::Array(arr) => key
                .as_index()
                .and_then(|i| arr.delete(i))
                .is_some_and(|old| !old.is_undefined()),
            Value::Object(obj) => obj.delete(&key.segment()).is_some(),
            _ => false,
        };
        existed && self.report(key)
    }

    /// Append to an array. Returns whether the watcher was notified.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        let Value::Array(arr) = &self.value else {
            return false;
        };
        let index = arr.len();
        self.set(index, value)
    }

    /// Resize an array, filling with `undefined`. Never notifies.
    pub fn set_len(&self, len: usize) {
        if let Value::Array(arr) = &self.value {
            if !arr.resize(len) {
                #[cfg(feature = "tracing")]
                tracing::warn!(len, current = arr.len(), "array resize out of range ignored");
            }
        }
    }

    fn is_relevant(&self, key: &Key) -> bool {
        match &self.mode {
            Mode::Inert => false,
            Mode::Deep => true,
            Mode::Tree(map) => map.is_relevant(&key.segment()),
        }
    }

    fn report(&self, key: Key) -> bool {
        if !self.is_relevant(&key) {
            return false;
        }
        let Some(notify) = &self.notify else {
            return false;
        };
        let mut path = self.path.clone();
        path.push(key);
        #[cfg(feature = "tracing")]
        tracing::trace!(path = ?path, "watched write");
        notify(&path);
        true
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_length(value: &Value) -> Option<usize> {
    let n = value.as_f64()?;
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

impl Deref for Watched {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for Watched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl fmt::Debug for Watched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Inert => "inert",
            Mode::Deep => "deep",
            Mode::Tree(_) => "tree",
        };
        f.debug_struct("Watched")
            .field("value", &self.value)
            .field("mode", &mode)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Notify, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let notify: Notify = Rc::new(move |path: &[Key]| {
            let dotted: Vec<String> = path.iter().map(ToString::to_string).collect();
            sink.borrow_mut().push(dotted.join("."));
        });
        (notify, log)
    }

    fn nested() -> Value {
        Value::object([
            ("a", Value::object([("d", Value::from(1)), ("e", Value::from(2))])),
            ("b", Value::object([("d", Value::from(3))])),
        ])
    }

    #[test]
    fn literal_and_wildcard_merge() {
        let (notify, log) = recorder();
        let root = Watched::new(nested(), &WatchTree::parse(&["a", "*.d"]), notify);

        assert!(root.get("a").set("d", 10));
        assert!(root.get("b").set("d", 30));
        assert!(!root.get("a").set("e", 20));
        assert!(root.set("a", Value::Null));
        assert_eq!(*log.borrow(), vec!["a.d", "b.d", "a"]);
    }

    #[test]
    fn wildcard_alone_ignores_other_members() {
        let (notify, log) = recorder();
        let root = Watched::new(nested(), &WatchTree::parse(&["*.d"]), notify);
        assert!(!root.get("a").set("e", 99));
        assert!(log.borrow().is_empty());
        // The write still lands.
        assert_eq!(root.get_path("a.e").as_f64(), Some(99.0));
    }

    #[test]
    fn unchanged_write_does_not_notify() {
        let (notify, log) = recorder();
        let root = Watched::deep(nested(), notify);
        assert!(!root.get("a").set("d", 1));
        let inner = root.get("a").value().clone();
        assert!(!root.set("a", inner));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn deep_mode_watches_new_structures() {
        let (notify, log) = recorder();
        let root = Watched::deep(nested(), notify);
        root.set("fresh", Value::object([("list", Value::array([]))]));
        assert!(root.get("fresh").get("list").push(Value::object([("k", Value::from(1))])));
        assert!(root.get_path("fresh.list.0").set("k", 2));
        assert_eq!(*log.borrow(), vec!["fresh", "fresh.list.0", "fresh.list.0.k"]);
    }

    #[test]
    fn dates_and_regexps_are_opaque() {
        let (notify, log) = recorder();
        let root = Watched::deep(
            Value::object([("when", Value::date(5.0)), ("re", Value::regexp("x"))]),
            notify,
        );
        let when = root.get("when");
        assert!(!when.is_watching());
        when.as_date().unwrap().set_time(10.0);
        assert!(!when.set("anything", 1));
        assert!(!root.get("re").is_watching());
        assert!(log.borrow().is_empty());
        assert_eq!(root.get("when").as_date().unwrap().time(), 10.0);
    }

    #[test]
    fn delete_missing_member_is_silent() {
        let (notify, log) = recorder();
        let root = Watched::deep(nested(), notify);
        assert!(!root.delete("missing"));
        assert!(root.delete("b"));
        assert!(root.value().get(&Key::from("b")).is_undefined());
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn array_length_is_not_structural() {
        let (notify, log) = recorder();
        let root = Watched::deep(Value::array([Value::from(1), Value::from(2)]), notify);
        assert!(!root.set("length", 0));
        assert_eq!(root.len(), 0);
        assert!(!root.set("label", "ignored"));
        assert!(root.push(7));
        assert!(root.set("0", 8));
        assert_eq!(*log.borrow(), vec!["0", "0"]);
    }

    #[test]
    fn array_delete_leaves_hole() {
        let (notify, log) = recorder();
        let root = Watched::deep(Value::array([Value::from(1)]), notify);
        assert!(root.delete(0));
        assert!(!root.delete(0));
        assert!(!root.delete(5));
        assert_eq!(root.len(), 1);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn undefined_elements_count_as_holes() {
        let (notify, log) = recorder();
        let root = Watched::deep(Value::array([Value::from(1)]), notify);
        assert!(root.set(0, Value::Undefined));
        assert!(!root.delete(0));
        assert!(root.set(0, 2));
        assert_eq!(*log.borrow(), vec!["0", "0"]);
    }

    #[test]
    fn out_of_range_array_writes_are_ignored() {
        let (notify, log) = recorder();
        let root = Watched::deep(Value::array(std::iter::empty()), notify);
        assert!(!root.set(usize::MAX, 1));
        assert!(!root.set(crate::value::MAX_ARRAY_LENGTH, 1));
        assert!(!root.set(100_000_000, 1));
        assert!(!root.set("length", 1e12));
        root.set_len(usize::MAX);
        assert_eq!(root.len(), 0);
        assert!(log.borrow().is_empty());

        assert!(root.set(crate::value::MAX_HOLE_RUN - 1, 1));
        assert_eq!(root.len(), crate::value::MAX_HOLE_RUN);
        assert_eq!(*log.borrow(), vec![format!("{}", crate::value::MAX_HOLE_RUN - 1)]);
    }

    #[test]
    fn exhausted_subtree_yields_inert_children() {
        let (notify, log) = recorder();
        let root = Watched::new(nested(), &WatchTree::parse(&["a"]), notify);
        let a = root.get("a");
        assert!(!a.is_watching());
        assert!(!a.set("d", 100));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn inert_handles_still_mutate() {
        let v = Value::object([("x", Value::from(1))]);
        let handle = Watched::inert(v.clone());
        assert!(!handle.set("x", 2));
        assert_eq!(v.get(&Key::from("x")).as_f64(), Some(2.0));
    }

    #[test]
    fn writes_into_leaves_are_noops() {
        let (notify, _log) = recorder();
        let root = Watched::deep(Value::from(3), notify);
        assert!(!root.set("x", 1));
        assert!(!root.push(1));
        assert!(!root.delete("x"));
    }
}
