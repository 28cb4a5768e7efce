#![forbid(unsafe_code)]

//! Error types shared by the core and the runtime.
//!
//! # Failure Modes
//!
//! | Error | Raised by | Fatal |
//! |-------|-----------|-------|
//! | [`ConfigError`] | property definition | yes, returned synchronously |
//! | [`EncodeError`] | complex value to attribute | no, replaced by the `"_"` sentinel |
//! | [`DecodeError`] | attribute to complex value | no, logged and read as `undefined` |

use std::fmt;

/// Misuse detected while defining a component's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A property key was empty.
    EmptyKey,
    /// The same key was declared in both the reflect and private namespaces.
    DuplicateKey(String),
    /// The declared default does not fit the declared property type.
    DefaultTypeMismatch {
        /// Property key.
        key: String,
        /// Declared property type.
        expected: &'static str,
        /// Type of the supplied default.
        found: &'static str,
    },
    /// Properties were already defined for this component.
    AlreadyDefined,
    /// The component was torn down before its properties were defined.
    Detached,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "property key must not be empty"),
            Self::DuplicateKey(key) => {
                write!(f, "property '{key}' is declared as both reflected and private")
            }
            Self::DefaultTypeMismatch {
                key,
                expected,
                found,
            } => write!(
                f,
                "default value of property '{key}' is {found}, expected {expected}"
            ),
            Self::AlreadyDefined => write!(f, "properties are already defined for this component"),
            Self::Detached => write!(f, "component has been torn down"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A value could not be encoded as an attribute string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The value contains a reference cycle.
    Cyclic,
    /// JSON serialization failed.
    Json(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cyclic => write!(f, "value contains a reference cycle"),
            Self::Json(msg) => write!(f, "json encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// An attribute string could not be decoded into a complex value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The attribute was not valid percent-encoded UTF-8.
    Url(String),
    /// The decoded text was not valid JSON.
    Json(String),
    /// The attribute names a reference no ancestor has registered.
    UnknownRef(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(msg) => write!(f, "invalid url-encoded attribute: {msg}"),
            Self::Json(msg) => write!(f, "invalid json attribute: {msg}"),
            Self::UnknownRef(r) => write!(f, "unresolved complex reference '{r}'"),
        }
    }
}

impl std::error::Error for DecodeError {}
