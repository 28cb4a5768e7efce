#![forbid(unsafe_code)]

//! Core data model for elementa components.
//!
//! This crate has no notion of elements or scheduling; it holds the pieces
//! the runtime builds on:
//!
//! - [`value`]: the dynamically typed [`Value`] stored in properties.
//! - [`watch`]: watch-path trees and [`Watched`] handles that report nested
//!   writes.
//! - [`change`]: [`ChangeType`] categories and [`should_recompute`].
//! - [`prop`]: declarative property specs and the attribute codec.
//! - [`error`]: the error types shared with the runtime.
//!
//! # Feature Flags
//!
//! - `tracing`: emit `trace!` events for watched writes.

pub mod change;
pub mod error;
pub mod prop;
pub mod value;
pub mod watch;

pub use change::{ChangeType, should_recompute};
pub use error::{ConfigError, DecodeError, EncodeError};
pub use prop::{CompiledProps, PropKind, PropertySpec, PropsSpec, ResolvedProp};
pub use value::{Key, Value};
pub use watch::{Notify, WatchTree, WatchTreeCache, Watched};
