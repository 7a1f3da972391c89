//! Computed Values
//!
//! A [`Computed`] is a cached derived value backed by a lazy [`Watcher`].
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs at construction.
//! 2. The first [`get`](Computed::get) runs the getter, records its
//!    dependencies and caches the result.
//! 3. A dependency change only marks the value dirty.
//! 4. The next `get` recomputes; reads of a clean value return the cache.
//!
//! When `get` is called while another watcher runs, that watcher is
//! subscribed to the computed value's own dependencies, so a computation of a
//! computation stays wired to the underlying state.

use std::fmt;

use super::watcher::Watcher;
use super::value::Value;
use crate::error::ReactiveError;

/// Freshness of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or the value was never computed).
    Dirty,

    /// The backing watcher was torn down; the cache is frozen.
    TornDown,
}

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    pub(crate) fn new(watcher: Watcher) -> Self {
        debug_assert!(watcher.options().lazy, "computed values need a lazy watcher");
        Self { watcher }
    }

    /// Current value, recomputing if dirty.
    ///
    /// Getter failures are returned and the value stays dirty.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        self.watcher.evaluate()?;
        if self.watcher.runtime().is_tracking() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    pub fn state(&self) -> ComputedState {
        if !self.watcher.is_active() {
            ComputedState::TornDown
        } else if self.watcher.is_dirty() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// The backing lazy watcher.
    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Stop tracking dependencies.
    pub fn teardown(&self) {
        self.watcher.teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.watcher.id())
            .field("state", &self.state())
            .field("dependency_count", &self.watcher.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn computed_caches_value_when_clean() {
        let runtime = Runtime::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = runtime.computed(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(42))
        });

        // Not computed yet
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get().unwrap(), Value::Int(42));
        assert_eq!(computed.get().unwrap(), Value::Int(42));
        assert_eq!(computed.get().unwrap(), Value::Int(42));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn computed_recomputes_after_dependency_change() {
        let runtime = Runtime::new();
        let state = Value::object([("n", 2)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let squared = runtime.computed(move || {
            let n = reader.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Value::Int(n * n))
        });

        assert_eq!(squared.get().unwrap(), Value::Int(4));
        object.set("n", 3);
        assert_eq!(squared.state(), ComputedState::Dirty);
        assert_eq!(squared.get().unwrap(), Value::Int(9));
    }

    #[test]
    fn computed_of_computed_stays_wired() {
        let runtime = Runtime::new();
        let state = Value::object([("base", 5)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let doubled = runtime.computed(move || {
            Ok(Value::Int(reader.get("base").and_then(|v| v.as_i64()).unwrap_or(0) * 2))
        });
        let doubled_clone = doubled.clone();
        let plus_ten = runtime.computed(move || {
            let doubled = doubled_clone.get()?.as_i64().unwrap_or(0);
            Ok(Value::Int(doubled + 10))
        });

        assert_eq!(plus_ten.get().unwrap(), Value::Int(20));

        object.set("base", 10);
        assert_eq!(doubled.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.get().unwrap(), Value::Int(30));
        assert_eq!(doubled.get().unwrap(), Value::Int(20));
    }

    #[test]
    fn torn_down_computed_keeps_last_value() {
        let runtime = Runtime::new();
        let state = Value::object([("n", 1)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let computed = runtime.computed(move || Ok(reader.get("n").unwrap_or_default()));
        assert_eq!(computed.get().unwrap(), Value::Int(1));

        computed.teardown();
        assert_eq!(computed.state(), ComputedState::TornDown);
        object.set("n", 2);
        assert_eq!(computed.get().unwrap(), Value::Int(1));
    }
}
