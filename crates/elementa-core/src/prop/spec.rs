#![forbid(unsafe_code)]

//! Declarative property specifications.
//!
//! A component declares its properties once, as a [`PropsSpec`] with two
//! namespaces:
//!
//! - **reflect**: visible as HTML attributes, synced in both directions.
//! - **private**: component-only, never mirrored onto attributes.
//!
//! [`PropsSpec::compile`] validates the declaration and resolves every
//! option against its defaults exactly once; the resulting
//! [`CompiledProps`] is shared by every instance of the component.
//!
//! # Defaults
//!
//! | Option | Default |
//! |--------|---------|
//! | `watch` | `true` |
//! | `coerce` | `false` |
//! | `strict` | `false` |
//! | `reflect_to_self` | `true` |
//! | `reflect_to_attribute` | `true` for reflect, always `false` for private |

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::name::{camel_to_dash, dash_to_camel};
use crate::error::ConfigError;
use crate::value::Value;
use crate::watch::{WatchTree, WatchTreeCache};

/// Primitive property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Text.
    String,
    /// Number; attributes are parsed with integer truncation.
    Number,
    /// Boolean; attribute presence, or the literal `"true"` when strict.
    Bool,
}

/// The declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropKind {
    /// A primitive type.
    Primitive(Primitive),
    /// Any JSON-able value; attributes carry URL-encoded JSON.
    Complex,
}

impl PropKind {
    /// Text.
    pub const STRING: Self = Self::Primitive(Primitive::String);
    /// Number.
    pub const NUMBER: Self = Self::Primitive(Primitive::Number);
    /// Boolean.
    pub const BOOL: Self = Self::Primitive(Primitive::Bool);

    /// Type name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Primitive(Primitive::String) => "string",
            Self::Primitive(Primitive::Number) => "number",
            Self::Primitive(Primitive::Bool) => "boolean",
            Self::Complex => "complex",
        }
    }

    /// Whether `value` fits this type. `undefined` and `null` fit every type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Undefined | Value::Null)
            | (Self::Complex, _)
            | (Self::Primitive(Primitive::String), Value::String(_))
            | (Self::Primitive(Primitive::Number), Value::Number(_))
            | (Self::Primitive(Primitive::Bool), Value::Bool(_)) => true,
            _ => false,
        }
    }
}

/// Whether a property must be provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Requirement {
    /// May be left `undefined`.
    #[default]
    Optional,
    /// Expected to be set; documented only, not enforced at runtime.
    Required,
}

/// The namespace a property was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Attribute-visible.
    Reflect,
    /// Component-only.
    Private,
}

/// A default value, either shared or produced per instance.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value. Containers are shared by every instance.
    Value(Value),
    /// Called once per instance.
    Factory(Rc<dyn Fn() -> Value>),
}

impl DefaultValue {
    /// Produce the value for one instance.
    #[must_use]
    pub fn produce(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Declarative description of one property.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    kind: PropKind,
    requirement: Requirement,
    default: Option<DefaultValue>,
    watch: Option<bool>,
    watch_paths: Vec<String>,
    coerce: Option<bool>,
    strict: Option<bool>,
    reflect_to_attribute: Option<bool>,
    reflect_to_self: Option<bool>,
    description: Option<String>,
}

impl PropertySpec {
    /// A property of the given type with every option at its default.
    #[must_use]
    pub const fn new(kind: PropKind) -> Self {
        Self {
            kind,
            requirement: Requirement::Optional,
            default: None,
            watch: None,
            watch_paths: Vec::new(),
            coerce: None,
            strict: None,
            reflect_to_attribute: None,
            reflect_to_self: None,
            description: None,
        }
    }

    /// A string property.
    #[must_use]
    pub const fn string() -> Self {
        Self::new(PropKind::STRING)
    }

    /// A number property.
    #[must_use]
    pub const fn number() -> Self {
        Self::new(PropKind::NUMBER)
    }

    /// A boolean property.
    #[must_use]
    pub const fn bool() -> Self {
        Self::new(PropKind::BOOL)
    }

    /// A complex (JSON-able) property.
    #[must_use]
    pub const fn complex() -> Self {
        Self::new(PropKind::Complex)
    }

    /// Mark the property as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    /// Mark the property as optional (the default).
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.requirement = Requirement::Optional;
        self
    }

    /// Default value, assigned when the component attaches.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Default produced per instance, for container defaults that must not
    /// be shared.
    #[must_use]
    pub fn default_with(mut self, factory: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(Rc::new(factory)));
        self
    }

    /// Whether a change re-renders the component.
    #[must_use]
    pub const fn watch(mut self, watch: bool) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Dotted paths whose nested mutation re-renders the component.
    #[must_use]
    pub fn watch_properties<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.watch_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Read `undefined` as the type's empty value.
    #[must_use]
    pub const fn coerce(mut self, coerce: bool) -> Self {
        self.coerce = Some(coerce);
        self
    }

    /// For booleans, only the literal attribute value `"true"` reads as true.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Mirror the value onto the host attribute.
    #[must_use]
    pub const fn reflect_to_attribute(mut self, reflect: bool) -> Self {
        self.reflect_to_attribute = Some(reflect);
        self
    }

    /// Expose the value as a direct accessor on the component.
    #[must_use]
    pub const fn reflect_to_self(mut self, reflect: bool) -> Self {
        self.reflect_to_self = Some(reflect);
        self
    }

    /// Human-readable description, kept for tooling.
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Declared type.
    #[must_use]
    pub const fn kind(&self) -> PropKind {
        self.kind
    }
}

impl From<PropKind> for PropertySpec {
    fn from(kind: PropKind) -> Self {
        Self::new(kind)
    }
}

/// Fully resolved options for one property.
#[derive(Debug, Clone)]
pub struct ResolvedProp {
    /// Canonical `camelCase` key.
    pub key: String,
    /// `kebab-case` attribute name.
    pub attribute: String,
    /// Declared namespace.
    pub namespace: Namespace,
    /// Declared type.
    pub kind: PropKind,
    /// Declared requirement.
    pub requirement: Requirement,
    /// Default, if any.
    pub default: Option<DefaultValue>,
    /// Re-render when the whole value is replaced.
    pub watch: bool,
    /// Structural watching of nested members, if enabled.
    pub watch_tree: Option<Rc<WatchTree>>,
    /// Substitute the empty value for `undefined` on read.
    pub coerce: bool,
    /// Strict boolean attribute parsing.
    pub strict: bool,
    /// Mirror onto the host attribute.
    pub reflect_to_attribute: bool,
    /// Expose as a direct accessor.
    pub reflect_to_self: bool,
    /// Description text.
    pub description: Option<String>,
}

impl ResolvedProp {
    fn resolve(
        key: &str,
        namespace: Namespace,
        spec: &PropertySpec,
        trees: &WatchTreeCache,
    ) -> Result<Self, ConfigError> {
        let key = dash_to_camel(key.trim());
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        if let Some(DefaultValue::Value(value)) = &spec.default {
            if !spec.kind.accepts(value) {
                return Err(ConfigError::DefaultTypeMismatch {
                    key,
                    expected: spec.kind.name(),
                    found: value.type_name(),
                });
            }
        }

        let watch = spec.watch.unwrap_or(true);
        let watch_tree = if !spec.watch_paths.is_empty() {
            Some(trees.get_or_parse(spec.watch_paths.as_slice()))
        } else if watch && spec.kind == PropKind::Complex {
            Some(trees.get_or_parse(&["**"]))
        } else {
            None
        };

        Ok(Self {
            attribute: camel_to_dash(&key),
            key,
            namespace,
            kind: spec.kind,
            requirement: spec.requirement,
            default: spec.default.clone(),
            watch: watch || !spec.watch_paths.is_empty(),
            watch_tree,
            coerce: spec.coerce.unwrap_or(false),
            strict: spec.strict.unwrap_or(false),
            reflect_to_attribute: namespace == Namespace::Reflect
                && spec.reflect_to_attribute.unwrap_or(true),
            reflect_to_self: spec.reflect_to_self.unwrap_or(true),
            description: spec.description.clone(),
        })
    }

    /// Whether the property is synced from its host attribute.
    #[must_use]
    pub fn is_attribute_visible(&self) -> bool {
        self.namespace == Namespace::Reflect
    }
}

/// Property declaration for a component, grouped by namespace.
#[derive(Debug, Clone, Default)]
pub struct PropsSpec {
    reflect: IndexMap<String, PropertySpec>,
    private: IndexMap<String, PropertySpec>,
}

impl PropsSpec {
    /// An empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute-visible property.
    #[must_use]
    pub fn reflect(mut self, key: impl Into<String>, spec: impl Into<PropertySpec>) -> Self {
        self.reflect.insert(key.into(), spec.into());
        self
    }

    /// Declare a component-only property.
    #[must_use]
    pub fn private(mut self, key: impl Into<String>, spec: impl Into<PropertySpec>) -> Self {
        self.private.insert(key.into(), spec.into());
        self
    }

    /// Validate and resolve every property.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyKey`] for a blank key.
    /// - [`ConfigError::DuplicateKey`] when a key is in both namespaces.
    /// - [`ConfigError::DefaultTypeMismatch`] for a default of the wrong type.
    pub fn compile(&self) -> Result<Rc<CompiledProps>, ConfigError> {
        self.compile_with(&WatchTreeCache::new())
    }

    /// Like [`PropsSpec::compile`], sharing watch trees through `trees`.
    ///
    /// # Errors
    ///
    /// See [`PropsSpec::compile`].
    pub fn compile_with(&self, trees: &WatchTreeCache) -> Result<Rc<CompiledProps>, ConfigError> {
        let mut props: IndexMap<String, Rc<ResolvedProp>> = IndexMap::new();
        let declared = self
            .reflect
            .iter()
            .map(|(k, s)| (k, s, Namespace::Reflect))
            .chain(self.private.iter().map(|(k, s)| (k, s, Namespace::Private)));
        for (key, spec, namespace) in declared {
            let resolved = ResolvedProp::resolve(key, namespace, spec, trees)?;
            if props.contains_key(&resolved.key) {
                return Err(ConfigError::DuplicateKey(resolved.key));
            }
            props.insert(resolved.key.clone(), Rc::new(resolved));
        }
        Ok(Rc::new(CompiledProps { props }))
    }
}

/// Validated, resolved property declaration, shared by all instances.
#[derive(Debug, Default)]
pub struct CompiledProps {
    props: IndexMap<String, Rc<ResolvedProp>>,
}

impl CompiledProps {
    /// Look up a property by canonical key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Rc<ResolvedProp>> {
        self.props.get(key)
    }

    /// Iterate in declaration order, reflected properties first.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<ResolvedProp>> {
        self.props.values()
    }

    /// Number of declared properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
