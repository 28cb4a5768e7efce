#![forbid(unsafe_code)]

//! Lifetime grouping for subscriptions.
//!
//! An element holds one [`SubscriptionScope`] for everything it listens to
//! (theme, locale). Tearing the element down clears the scope, so no
//! callback from a dead element ever fires.

use std::fmt;

use super::observable::{Observable, Subscription};

/// Owns a set of [`Subscription`]s and releases them together.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// An empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe to `source` for the lifetime of the scope.
    pub fn subscribe<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        self.subscriptions.push(source.subscribe(callback));
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything, newest first.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}
