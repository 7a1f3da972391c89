//! Dependency Sets
//!
//! A [`Dep`] is the set of watchers interested in one observable slot: a
//! property of an observed object, or an observed container as a whole.
//! Reading the slot while a watcher runs adds an edge (`depend`); writing it
//! notifies every subscriber (`notify`).
//!
//! Subscribers are held weakly. Eager watchers are kept alive by their scope,
//! or by the runtime when they have none, until they are torn down; only a
//! dropped lazy watcher (an unreachable computed value) disappears from the
//! set on the next notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::reactive::runtime::{Runtime, RuntimeInner};
use crate::reactive::watcher::{Watcher, WatcherInner};
use crate::reactive::SubscriberId;

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The set of watchers subscribed to one observable slot.
///
/// Cloning a `Dep` yields another handle to the same set.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

struct DepInner {
    id: DepId,
    /// Runtime whose context stack reads of this slot are reported to.
    runtime: Weak<RuntimeInner>,
    subscribers: DashMap<SubscriberId, Weak<WatcherInner>>,
}

impl Dep {
    /// Create an empty dependency set bound to a runtime.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::next(),
                runtime: runtime.downgrade(),
                subscribers: DashMap::new(),
            }),
        }
    }

    /// Get the dependency set's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// The runtime this set belongs to, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        Runtime::upgrade(&self.inner.runtime)
    }

    /// Add a subscriber. Adding the same watcher twice is a no-op.
    pub fn add_sub(&self, watcher: &Watcher) {
        self.inner
            .subscribers
            .insert(watcher.id(), watcher.downgrade());
    }

    /// Remove a subscriber.
    pub fn remove_sub(&self, id: SubscriberId) {
        self.inner.subscribers.remove(&id);
    }

    /// Record an edge between the currently running watcher and this set.
    ///
    /// Does nothing when no watcher is running or tracking is suspended.
    pub fn depend(&self) {
        let Some(runtime) = self.runtime() else {
            return;
        };
        if let Some(watcher) = runtime.current_watcher() {
            watcher.add_dep(self);
        }
    }

    /// Notify every live subscriber, in ascending subscriber id order.
    pub fn notify(&self) {
        // Snapshot before calling out: subscribers may re-enter this set.
        let mut subscribers: Vec<Watcher> = self
            .inner
            .subscribers
            .iter()
            .filter_map(|entry| Watcher::upgrade(entry.value()))
            .collect();
        self.inner
            .subscribers
            .retain(|_, watcher| watcher.strong_count() > 0);

        subscribers.sort_by_key(Watcher::id);
        tracing::trace!(
            dep = self.inner.id.raw(),
            subscribers = subscribers.len(),
            "notify"
        );

        for watcher in subscribers {
            watcher.update();
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Check whether a watcher is subscribed.
    pub fn has_sub(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.contains_key(&id)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
