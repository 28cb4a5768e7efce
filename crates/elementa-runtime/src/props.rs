#![forbid(unsafe_code)]

//! The property registry.
//!
//! [`Props::define`] installs a compiled property declaration on an
//! element. From then on every property has one slot holding its current
//! value, always wrapped in a [`Watched`] handle (inert when the property
//! is not structurally watched), and values flow three ways:
//!
//! | Direction | Entry point | Reflects to attribute | Compares with |
//! |-----------|-------------|-----------------------|---------------|
//! | property write | [`Props::set`], [`Element::set`] | yes | identity |
//! | attribute write | [`Element::set_attribute`] | no | identity, structural for complex |
//! | nested write | a [`Watched`] handle from [`Props::get`] | no | identity of the member |
//!
//! A committed change fires `before_prop_change`, stores the value, fires
//! `prop_change`, notifies change listeners, reflects (property writes
//! only) and schedules a [`ChangeType::PROP`] render when the property is
//! watched. A write that changes nothing does none of these.
//!
//! # Initial values
//!
//! Primitive reflected properties read an existing attribute during
//! `define`. Everything else (defaults, complex attributes, which may name
//! an ancestor's registered reference) is assigned when the element
//! connects. [`Ready`] resolves once that has happened.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | malformed complex attribute | `warn!`, property reads `undefined` |
//! | unresolved reference | `warn!`, property reads `undefined` |
//! | complex value not encodable | `warn!`, attribute set to `"_"` |
//! | structural watching disabled | `warn!` once, values stored unwrapped |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use elementa_core::prop::codec::{self, Decoded};
use elementa_core::prop::{ENCODE_FAILURE, PropKind, dash_to_camel};
use elementa_core::{ChangeType, CompiledProps, ConfigError, Key, ResolvedProp, Value, Watched};
use indexmap::IndexMap;

use crate::element::{ChangeNotice, Deferred, Element, PropChange};
use crate::error::PropError;

// ---------------------------------------------------------------------------
// Ready
// ---------------------------------------------------------------------------

struct ReadyInner {
    done: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Completion handle returned by [`Props::define`]: resolves once every
/// property has its initial value.
#[derive(Clone)]
pub struct Ready {
    inner: Rc<ReadyInner>,
}

impl Ready {
    fn new() -> Self {
        Self {
            inner: Rc::new(ReadyInner {
                done: Cell::new(false),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Whether initial values have been assigned.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.done.get()
    }

    /// Run `f` once ready; immediately if already ready.
    pub fn then(&self, f: impl FnOnce() + 'static) {
        if self.is_ready() {
            f();
        } else {
            self.inner.callbacks.borrow_mut().push(Box::new(f));
        }
    }

    pub(crate) fn resolve(&self) {
        if self.inner.done.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.borrow_mut());
        for f in callbacks {
            f();
        }
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("ready", &self.is_ready())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Property table
// ---------------------------------------------------------------------------

struct PropSlot {
    config: Rc<ResolvedProp>,
    current: Watched,
    self_accessor: bool,
}

/// Per-element property storage.
pub(crate) struct PropTable {
    spec: Rc<CompiledProps>,
    slots: IndexMap<String, PropSlot>,
}

impl PropTable {
    pub(crate) fn config(&self, key: &str) -> Option<&Rc<ResolvedProp>> {
        self.slots.get(key).map(|s| &s.config)
    }
}

/// How a commit was triggered.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Property,
    Attribute,
}

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// The component-visible property object of an element.
#[derive(Clone, Debug)]
pub struct Props {
    element: Element,
}

impl Props {
    /// Install `spec` on `element`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyDefined`] if the element already has
    ///   properties.
    /// - [`ConfigError::Detached`] if the element was torn down.
    pub fn define(element: &Element, spec: &Rc<CompiledProps>) -> Result<Ready, ConfigError> {
        {
            let state = element.inner.state.borrow();
            if state.torn_down {
                return Err(ConfigError::Detached);
            }
            if state.props.is_some() {
                return Err(ConfigError::AlreadyDefined);
            }
        }

        let host = element.host();
        let slots = spec
            .iter()
            .map(|config| {
                let self_accessor = config.reflect_to_self && !host.has_own_property(&config.key);
                if config.reflect_to_self && !self_accessor {
                    tracing::debug!(
                        component = %element.id(),
                        key = %config.key,
                        "host owns this member; skipping reflect-to-self accessor"
                    );
                }
                let slot = PropSlot {
                    config: Rc::clone(config),
                    current: Watched::inert(Value::Undefined),
                    self_accessor,
                };
                (config.key.clone(), slot)
            })
            .collect();
        element.inner.state.borrow_mut().props = Some(PropTable {
            spec: Rc::clone(spec),
            slots,
        });
        tracing::debug!(component = %element.id(), count = spec.len(), "properties defined");

        for config in spec.iter() {
            let primitive = matches!(config.kind, PropKind::Primitive(_));
            if primitive && config.is_attribute_visible() && host.has_attribute(&config.attribute) {
                element.sync_from_attribute(&config.key);
            }
        }

        let ready = Ready::new();
        for config in spec.iter() {
            let key = config.key.clone();
            element.defer_or_run(Deferred::Init(Box::new(move |el: &Element| {
                el.assign_initial(&key);
            })));
        }
        element.defer_or_run(Deferred::Ready(ready.clone()));
        Ok(ready)
    }

    /// The element these properties belong to.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Read a property. Unknown keys read `undefined`.
    #[must_use]
    pub fn get(&self, key: &str) -> Watched {
        self.try_get(key)
            .unwrap_or_else(|_| Watched::inert(Value::Undefined))
    }

    /// Read a property, applying coercion.
    ///
    /// # Errors
    ///
    /// [`PropError::Unknown`] if `key` was never declared.
    pub fn try_get(&self, key: &str) -> Result<Watched, PropError> {
        let (config, current, _) = self.element.slot(key)?;
        if config.coerce && current.is_undefined() {
            return Ok(Watched::inert(codec::coerced(config.kind)));
        }
        Ok(current)
    }

    /// The stored value, without coercion.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.element
            .slot(key)
            .ok()
            .map(|(_, current, _)| current.into_value())
    }

    /// Write a property. Returns whether the value changed.
    ///
    /// # Errors
    ///
    /// [`PropError::Unknown`] if `key` was never declared,
    /// [`PropError::Detached`] after teardown.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool, PropError> {
        self.element.write_property(key, value.into())
    }

    /// Whether `key` is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.element.slot(key).is_ok()
    }

    /// Declared keys in declaration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.element
            .inner
            .state
            .borrow()
            .props
            .as_ref()
            .map(|t| t.slots.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolved options of `key`.
    #[must_use]
    pub fn config(&self, key: &str) -> Option<Rc<ResolvedProp>> {
        self.element.slot(key).ok().map(|(config, _, _)| config)
    }

    /// The compiled declaration, if defined.
    #[must_use]
    pub fn spec(&self) -> Option<Rc<CompiledProps>> {
        self.element
            .inner
            .state
            .borrow()
            .props
            .as_ref()
            .map(|t| Rc::clone(&t.spec))
    }
}

// ---------------------------------------------------------------------------
// Element integration
// ---------------------------------------------------------------------------

impl Element {
    /// The element's property object.
    #[must_use]
    pub fn props(&self) -> Props {
        Props {
            element: self.clone(),
        }
    }

    /// Read through the reflect-to-self accessor.
    ///
    /// # Errors
    ///
    /// [`PropError::Unknown`] for undeclared keys,
    /// [`PropError::NoSelfAccessor`] when no accessor was installed.
    pub fn get(&self, key: &str) -> Result<Watched, PropError> {
        let (_, _, accessor) = self.slot(key)?;
        if !accessor {
            return Err(PropError::NoSelfAccessor(dash_to_camel(key)));
        }
        self.props().try_get(key)
    }

    /// Write through the reflect-to-self accessor.
    ///
    /// # Errors
    ///
    /// As [`Element::get`], plus [`PropError::Detached`] after teardown.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool, PropError> {
        let (_, _, accessor) = self.slot(key)?;
        if !accessor {
            return Err(PropError::NoSelfAccessor(dash_to_camel(key)));
        }
        self.write_property(key, value.into())
    }

    fn slot(&self, key: &str) -> Result<(Rc<ResolvedProp>, Watched, bool), PropError> {
        let state = self.inner.state.borrow();
        let table = state
            .props
            .as_ref()
            .ok_or_else(|| PropError::Unknown(key.to_owned()))?;
        let slot = table
            .slots
            .get(key)
            .or_else(|| table.slots.get(&dash_to_camel(key)))
            .ok_or_else(|| PropError::Unknown(key.to_owned()))?;
        Ok((Rc::clone(&slot.config), slot.current.clone(), slot.self_accessor))
    }

    fn write_property(&self, key: &str, value: Value) -> Result<bool, PropError> {
        if self.is_torn_down() {
            return Err(PropError::Detached);
        }
        let (config, current, _) = self.slot(key)?;
        if current.value().same(&value) {
            return Ok(false);
        }
        self.commit(&config, current.into_value(), value, Origin::Property);
        Ok(true)
    }

    /// Read the property's attribute and commit the decoded value if it
    /// differs.
    pub(crate) fn sync_from_attribute(&self, key: &str) {
        let Ok((config, current, _)) = self.slot(key) else {
            return;
        };
        let raw = self.host().get_attribute(&config.attribute);
        let value = self.decode(&config, raw.as_deref());
        let unchanged = match config.kind {
            PropKind::Complex => current.value().deep_eq(&value),
            PropKind::Primitive(_) => current.value().same(&value),
        };
        if unchanged {
            return;
        }
        self.commit(&config, current.into_value(), value, Origin::Attribute);
    }

    fn decode(&self, config: &ResolvedProp, raw: Option<&str>) -> Value {
        match codec::decode_attribute(config.kind, config.strict, raw) {
            Ok(Decoded::Value(value)) => value,
            Ok(Decoded::Ref(name)) => self.resolve_ref(&name).unwrap_or_else(|| {
                tracing::warn!(
                    component = %self.id(),
                    key = %config.key,
                    reference = %name,
                    "unresolved complex reference; reading undefined"
                );
                Value::Undefined
            }),
            Err(err) => {
                tracing::warn!(
                    component = %self.id(),
                    key = %config.key,
                    error = %err,
                    "failed to decode attribute; reading undefined"
                );
                Value::Undefined
            }
        }
    }

    fn assign_initial(&self, key: &str) {
        let Ok((config, current, _)) = self.slot(key) else {
            return;
        };
        if config.is_attribute_visible() && self.host().has_attribute(&config.attribute) {
            self.sync_from_attribute(key);
            return;
        }
        if !current.is_undefined() {
            return;
        }
        if let Some(default) = &config.default {
            let value = default.produce();
            if !value.is_undefined() {
                self.commit(&config, Value::Undefined, value, Origin::Property);
            }
        }
    }

    fn commit(&self, config: &Rc<ResolvedProp>, old_value: Value, new_value: Value, origin: Origin) {
        let event = PropChange {
            key: config.key.clone(),
            new_value: new_value.clone(),
            old_value,
        };
        self.inner.events.before_prop_change.emit(&event);

        let handle = self.wrap(config, new_value.clone());
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(slot) = state.props.as_mut().and_then(|t| t.slots.get_mut(&config.key)) {
                slot.current = handle;
            }
        }
        tracing::trace!(component = %self.id(), key = %config.key, value = %new_value, "property committed");

        self.inner.events.prop_change.emit(&event);
        self.inner.events.change.emit(&ChangeNotice {
            key: config.key.clone(),
            path: Vec::new(),
        });
        if origin == Origin::Property && config.reflect_to_attribute {
            self.reflect(config, &new_value);
        }
        if config.watch {
            self.request_render_for(ChangeType::PROP, Some(&config.key));
        }
    }

    fn wrap(&self, config: &ResolvedProp, value: Value) -> Watched {
        let Some(tree) = &config.watch_tree else {
            return Watched::inert(value);
        };
        if !value.is_watchable() || !self.runtime().structural_watching() {
            return Watched::inert(value);
        }
        let target = self.downgrade();
        let key = config.key.clone();
        let notify = Rc::new(move |path: &[Key]| {
            if let Some(el) = target.upgrade() {
                el.nested_change(&key, path);
            }
        });
        Watched::new(value, tree, notify)
    }

    fn nested_change(&self, key: &str, path: &[Key]) {
        if self.is_torn_down() {
            return;
        }
        self.inner.events.change.emit(&ChangeNotice {
            key: key.to_owned(),
            path: path.to_vec(),
        });
        self.request_render_for(ChangeType::PROP, Some(key));
    }

    fn reflect(&self, config: &ResolvedProp, value: &Value) {
        let host = self.host();
        match codec::encode_attribute(config.kind, config.strict, value) {
            Ok(Some(text)) => host.set_attribute_raw(&config.attribute, &text),
            Ok(None) => host.remove_attribute_raw(&config.attribute),
            Err(err) => {
                tracing::warn!(
                    component = %self.id(),
                    key = %config.key,
                    error = %err,
                    "cannot encode property for its attribute"
                );
                host.set_attribute_raw(&config.attribute, ENCODE_FAILURE);
            }
        }
    }
}
