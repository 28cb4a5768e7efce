#![forbid(unsafe_code)]

//! Runtime errors.
//!
//! Definition-time misuse is a [`ConfigError`] (re-exported from the core).
//! Accessing properties that were never declared is a [`PropError`];
//! an invalid parent/child link is a [`HierarchyError`].
//! Attribute encode and decode failures never surface here; the registry
//! logs them and falls back.

use std::fmt;

pub use elementa_core::{ConfigError, DecodeError, EncodeError};

/// Misuse of a defined property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropError {
    /// No property with this key was declared.
    Unknown(String),
    /// The property has no reflect-to-self accessor, either because it was
    /// declared with `reflect_to_self(false)` or because the host already
    /// owns a member with that name.
    NoSelfAccessor(String),
    /// The element was torn down.
    Detached,
}

impl fmt::Display for PropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(key) => write!(f, "no property '{key}' is defined"),
            Self::NoSelfAccessor(key) => {
                write!(f, "property '{key}' is not reflected onto the component")
            }
            Self::Detached => write!(f, "component has been torn down"),
        }
    }
}

impl std::error::Error for PropError {}

/// Rejected change to the component hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyError {
    /// The child is the parent itself or one of its ancestors.
    Cycle,
    /// One of the elements was torn down.
    Detached,
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => write!(f, "an element cannot be appended below itself"),
            Self::Detached => write!(f, "component has been torn down"),
        }
    }
}

impl std::error::Error for HierarchyError {}
