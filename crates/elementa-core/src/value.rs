#![forbid(unsafe_code)]

//! Dynamic property values.
//!
//! [`Value`] is the data model for every component property: primitives,
//! opaque leaves (`Date`, `RegExp`) and shared containers (`Array`,
//! `Object`). Containers are reference-counted, so cloning a `Value` clones
//! a handle, not the data, and two clones observe the same mutations.
//!
//! # Equality
//!
//! Change detection uses [`Value::same`]: identity for containers and dates,
//! SameValue for primitives (`NaN` is the same as `NaN`, `0.0` and `-0.0`
//! are not). Structural comparison is available as [`Value::deep_eq`].
//!
//! # Mutation
//!
//! Containers expose no public mutators. Writes go through
//! [`Watched`](crate::watch::Watched) handles, which decide whether the
//! write must be reported to a watcher.
//!
//! # JSON
//!
//! [`Value::to_json`] follows `JSON.stringify`: `undefined` members are
//! dropped (and become `null` inside arrays), non-finite numbers become
//! `null`, a `Date` becomes its millisecond timestamp, a `RegExp` becomes an
//! empty object. Cycles are reported as [`EncodeError::Cyclic`].

use std::borrow::Cow;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::EncodeError;

/// Nesting depth after which `Debug` output is elided.
const DEBUG_DEPTH: usize = 16;

/// Property key inside a container: an array index or an object member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Numeric index.
    Index(usize),
    /// Member name.
    Name(String),
}

impl Key {
    /// The key as a path segment (`"3"`, `"name"`).
    #[must_use]
    pub fn segment(&self) -> Cow<'_, str> {
        match self {
            Self::Index(i) => Cow::Owned(i.to_string()),
            Self::Name(name) => Cow::Borrowed(name),
        }
    }

    /// The key as an array index, if it is one.
    ///
    /// Names in canonical decimal form (`"2"`, not `"02"`) count as indices.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Name(name) => {
                let idx: usize = name.parse().ok()?;
                (idx.to_string() == *name).then_some(idx)
            }
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment())
    }
}

/// Shared, mutable timestamp (milliseconds since the Unix epoch).
#[derive(Clone)]
pub struct DateCell(Rc<Cell<f64>>);

impl DateCell {
    /// Milliseconds since the epoch.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.0.get()
    }

    /// Replace the timestamp. Dates are opaque to watchers, so this never
    /// notifies anyone.
    pub fn set_time(&self, millis: f64) {
        self.0.set(millis);
    }
}

/// Largest array length a write may produce.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Most `undefined` holes a single write or resize may open.
pub const MAX_HOLE_RUN: usize = 1 << 16;

/// Shared array storage.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    /// Borrow the elements.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Write `value` at `index`, growing with `undefined` holes as needed.
    /// Returns the previous element, or `None` when the write would grow
    /// the array past [`MAX_ARRAY_LENGTH`] or open more than
    /// [`MAX_HOLE_RUN`] holes. Rejected writes leave the array untouched.
    pub(crate) fn write(&self, index: usize, value: Value) -> Option<Value> {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            let len = index.checked_add(1).filter(|&n| n <= MAX_ARRAY_LENGTH)?;
            if len - items.len() > MAX_HOLE_RUN {
                return None;
            }
            items.resize(len, Value::Undefined);
        }
        Some(std::mem::replace(&mut items[index], value))
    }

    /// Delete the element at `index`, leaving a hole. Returns `None` when the
    /// index is out of bounds.
    pub(crate) fn delete(&self, index: usize) -> Option<Value> {
        let mut items = self.0.borrow_mut();
        let slot = items.get_mut(index)?;
        Some(std::mem::replace(slot, Value::Undefined))
    }

    /// Truncate or grow to `len`. Growth is bounded like [`write`](Self::write);
    /// returns whether the resize was applied.
    pub(crate) fn resize(&self, len: usize) -> bool {
        let mut items = self.0.borrow_mut();
        if len > MAX_ARRAY_LENGTH || len.saturating_sub(items.len()) > MAX_HOLE_RUN {
            return false;
        }
        items.resize(len, Value::Undefined);
        true
    }

    fn ptr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

/// Shared object storage. Members keep insertion order.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<IndexMap<String, Value>>>);

impl ObjectRef {
    /// Borrow the members.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, IndexMap<String, Value>> {
        self.0.borrow()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Write member `name`. Returns the previous value, if the member existed.
    pub(crate) fn write(&self, name: &str, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(name.to_owned(), value)
    }

    /// Remove member `name`. Returns `None` when it did not exist.
    pub(crate) fn delete(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(name)
    }

    fn ptr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// IEEE-754 double.
    Number(f64),
    /// String.
    String(String),
    /// Timestamp leaf. Never watched.
    Date(DateCell),
    /// Regular expression source. Never watched.
    RegExp(Rc<str>),
    /// Shared array.
    Array(ArrayRef),
    /// Shared object.
    Object(ObjectRef),
}

impl Value {
    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(ArrayRef(Rc::new(RefCell::new(items.into_iter().collect()))))
    }

    /// Build an object value from `(name, value)` pairs.
    pub fn object<K: Into<String>>(members: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = members.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Object(ObjectRef(Rc::new(RefCell::new(map))))
    }

    /// Build a date value.
    #[must_use]
    pub fn date(millis: f64) -> Self {
        Self::Date(DateCell(Rc::new(Cell::new(millis))))
    }

    /// Build a regular expression value.
    #[must_use]
    pub fn regexp(source: &str) -> Self {
        Self::RegExp(Rc::from(source))
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::RegExp(_) => "regexp",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Whether the value is `undefined`.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether the value is `undefined` or `null`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Whether a watcher may descend into this value.
    ///
    /// Only arrays and objects qualify; dates and regular expressions are
    /// opaque leaves.
    #[must_use]
    pub const fn is_watchable(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    /// Boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric payload.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Date payload.
    #[must_use]
    pub const fn as_date(&self) -> Option<&DateCell> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Read member or element `key`. Missing entries and non-containers
    /// yield `undefined`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Self {
        match self {
            Self::Array(arr) => key
                .as_index()
                .and_then(|i| arr.borrow().get(i).cloned())
                .unwrap_or_default(),
            Self::Object(obj) => obj.borrow().get(&*key.segment()).cloned().unwrap_or_default(),
            _ => Self::Undefined,
        }
    }

    /// Follow a dotted path (`"a.b.0"`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Self {
        path.split('.')
            .filter(|seg| !seg.is_empty())
            .fold(self.clone(), |cur, seg| cur.get(&Key::from(seg)))
    }

    /// Number of elements or members; zero for non-containers.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Array(arr) => arr.len(),
            Self::Object(obj) => obj.len(),
            _ => 0,
        }
    }

    /// Whether [`Value::len`] is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SameValue comparison: identity for containers and dates.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Self::RegExp(a), Self::RegExp(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }

    /// Structural equality. Containers compare element-wise; cycles compare
    /// equal once the same pair of containers is revisited.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        deep_eq_inner(self, other, &mut Vec::new())
    }

    /// Convert to JSON following `JSON.stringify` rules.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Cyclic`] when the value contains itself.
    pub fn to_json(&self) -> Result<serde_json::Value, EncodeError> {
        to_json_inner(self, &mut Vec::new())
    }

    /// Build a value from parsed JSON.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::array(items.iter().map(Self::from_json)),
            Json::Object(members) => {
                Self::object(members.iter().map(|(k, v)| (k.clone(), Self::from_json(v))))
            }
        }
    }

    /// Container identity, used for cycle detection.
    fn container_ptr(&self) -> Option<usize> {
        match self {
            Self::Array(arr) => Some(arr.ptr()),
            Self::Object(obj) => Some(obj.ptr()),
            _ => None,
        }
    }
}

fn deep_eq_inner(a: &Value, b: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
    if a.same(b) {
        return true;
    }
    let (Some(pa), Some(pb)) = (a.container_ptr(), b.container_ptr()) else {
        return match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Date(x), Value::Date(y)) => x.time().to_bits() == y.time().to_bits(),
            (Value::RegExp(x), Value::RegExp(y)) => x == y,
            _ => false,
        };
    };
    if seen.contains(&(pa, pb)) {
        return true;
    }
    seen.push((pa, pb));
    let equal = match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            x.len() == y.len() && x.iter().zip(&y).all(|(l, r)| deep_eq_inner(l, r, seen))
        }
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| deep_eq_inner(l, r, seen)))
        }
        _ => false,
    };
    seen.pop();
    equal
}

fn to_json_inner(value: &Value, stack: &mut Vec<usize>) -> Result<serde_json::Value, EncodeError> {
    use serde_json::Value as Json;
    let json = match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => number_to_json(d.time()),
        Value::RegExp(_) => Json::Object(serde_json::Map::new()),
        Value::Array(arr) => {
            let ptr = arr.ptr();
            if stack.contains(&ptr) {
                return Err(EncodeError::Cyclic);
            }
            stack.push(ptr);
            let items = arr.borrow().clone();
            let out = items
                .iter()
                .map(|item| to_json_inner(item, stack))
                .collect::<Result<Vec<_>, _>>()?;
            stack.pop();
            Json::Array(out)
        }
        Value::Object(obj) => {
            let ptr = obj.ptr();
            if stack.contains(&ptr) {
                return Err(EncodeError::Cyclic);
            }
            stack.push(ptr);
            let members = obj.borrow().clone();
            let mut out = serde_json::Map::new();
            for (name, member) in &members {
                if member.is_undefined() {
                    continue;
                }
                out.insert(name.clone(), to_json_inner(member, stack)?);
            }
            stack.pop();
            Json::Object(out)
        }
    };
    Ok(json)
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        // Integral values serialize without a trailing `.0`, like JavaScript.
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_value(self, f, 0)
    }
}

fn debug_value(value: &Value, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    match value {
        Value::Undefined => f.write_str("undefined"),
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Date(d) => write!(f, "Date({})", d.time()),
        Value::RegExp(src) => write!(f, "/{src}/"),
        Value::Array(_) | Value::Object(_) if depth >= DEBUG_DEPTH => f.write_str(".."),
        Value::Array(arr) => {
            f.write_str("[")?;
            for (i, item) in arr.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                debug_value(item, f, depth + 1)?;
            }
            f.write_str("]")
        }
        Value::Object(obj) => {
            f.write_str("{")?;
            for (i, (name, member)) in obj.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: ")?;
                debug_value(member, f, depth + 1)?;
            }
            f.write_str("}")
        }
    }
}

impl fmt::Display for Value {
    /// Text form used when a value is rendered as plain text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Date(d) => f.write_str(&format_number(d.time())),
            Self::RegExp(src) => write!(f, "/{src}/"),
            Self::Array(_) | Self::Object(_) => match self.to_json() {
                Ok(json) => write!(f, "{json}"),
                Err(_) => f.write_str("[cyclic]"),
            },
        }
    }
}

/// Format a number the way JavaScript's `String(n)` does for common cases.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Undefined, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::array(items.into_iter().map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_is_identity_for_containers() {
        let a = Value::array([Value::from(1)]);
        let b = a.clone();
        let c = Value::array([Value::from(1)]);
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert!(a.deep_eq(&c));
    }

    #[test]
    fn same_value_semantics_for_numbers() {
        assert!(Value::from(f64::NAN).same(&Value::from(f64::NAN)));
        assert!(!Value::from(0.0).same(&Value::from(-0.0)));
        assert!(Value::from(2).same(&Value::from(2.0)));
    }

    #[test]
    fn get_path_walks_nested_members() {
        let v = Value::object([(
            "a",
            Value::object([("b", Value::array([Value::from("x"), Value::from("y")]))]),
        )]);
        assert_eq!(v.get_path("a.b.1").as_str(), Some("y"));
        assert!(v.get_path("a.missing.deeper").is_undefined());
    }

    #[test]
    fn key_index_requires_canonical_form() {
        assert_eq!(Key::from("3").as_index(), Some(3));
        assert_eq!(Key::from("03").as_index(), None);
        assert_eq!(Key::from("length").as_index(), None);
    }

    #[test]
    fn to_json_follows_stringify_rules() {
        let v = Value::object([
            ("n", Value::from(3)),
            ("skip", Value::Undefined),
            ("arr", Value::array([Value::Undefined, Value::from(f64::INFINITY)])),
            ("re", Value::regexp("a+")),
            ("when", Value::date(1000.0)),
        ]);
        assert_eq!(
            v.to_json().unwrap(),
            json!({"n": 3, "arr": [null, null], "re": {}, "when": 1000})
        );
    }

    #[test]
    fn to_json_detects_cycles() {
        let outer = Value::object([("x", Value::from(1))]);
        if let Value::Object(obj) = &outer {
            obj.write("self", outer.clone());
        }
        assert_eq!(outer.to_json(), Err(EncodeError::Cyclic));
    }

    #[test]
    fn shared_subtrees_are_not_cycles() {
        let leaf = Value::object([("k", Value::from(true))]);
        let v = Value::array([leaf.clone(), leaf]);
        assert_eq!(v.to_json().unwrap(), json!([{"k": true}, {"k": true}]));
    }

    #[test]
    fn from_json_round_trips_structure() {
        let json = json!({"a": [1, "two", null, {"b": false}]});
        let v = Value::from_json(&json);
        assert_eq!(v.to_json().unwrap(), json);
    }

    #[test]
    fn display_formats_like_javascript() {
        assert_eq!(Value::from(10).to_string(), "10");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::array([Value::from(1)]).to_string(), "[1]");
    }

    #[test]
    fn debug_survives_cycles() {
        let outer = Value::array(Vec::<Value>::new());
        if let Value::Array(arr) = &outer {
            arr.write(0, outer.clone());
        }
        let dbg = format!("{outer:?}");
        assert!(dbg.contains(".."));
    }
}
