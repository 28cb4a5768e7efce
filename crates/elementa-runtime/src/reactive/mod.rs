#![forbid(unsafe_code)]

//! Reactive primitives used by the runtime.
//!
//! - [`Observable`]: a shared, versioned value with change notification.
//! - [`Subscribers`]: the weakly held callback list behind observables and
//!   element event listeners.
//! - [`Subscription`]: RAII guard; dropping it unsubscribes.
//! - [`SubscriptionScope`]: releases a group of subscriptions together.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Setting a value equal to the current value is a no-op.
//! 3. Dropping a [`Subscription`] removes the callback before the next
//!    notification.

pub mod observable;
pub mod scope;

pub use observable::{Observable, Subscribers, Subscription};
pub use scope::SubscriptionScope;
