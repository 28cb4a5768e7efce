#![forbid(unsafe_code)]

//! Structural watching of nested property values.
//!
//! - [`WatchTree`]: compiled watch paths (`"a.b"`, `"*.d"`, `"**"`).
//! - [`Watched`]: value handle that applies writes and reports the relevant
//!   ones to a notify callback.

pub mod path;
pub mod proxy;

pub use path::{WatchMap, WatchNode, WatchTree, WatchTreeCache};
pub use proxy::{Notify, Watched};
