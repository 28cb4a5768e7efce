#![forbid(unsafe_code)]

//! Property declarations and their attribute representation.
//!
//! - [`spec`]: the declarative [`PropsSpec`] and its compiled form.
//! - [`codec`]: attribute string encoding and decoding.
//! - [`name`]: `camelCase` keys and `kebab-case` attribute names.

pub mod codec;
pub mod name;
pub mod spec;

pub use codec::{Decoded, ENCODE_FAILURE, REF_PREFIX};
pub use name::{camel_to_dash, dash_to_camel};
pub use spec::{
    CompiledProps, DefaultValue, Namespace, Primitive, PropKind, PropertySpec, PropsSpec,
    Requirement, ResolvedProp,
};
