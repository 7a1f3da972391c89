//! Subscriber identifiers.
//!
//! Every watcher gets a `SubscriberId` at construction. Ids grow
//! monotonically, so they double as creation order: the scheduler flushes in
//! ascending id order and dependency sets notify in ascending id order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique, ordered identifier for a subscriber (watcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate the next subscriber ID.
    ///
    /// Uses an atomic counter so ids stay unique across engine instances.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
