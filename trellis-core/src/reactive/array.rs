//! Observable Arrays
//!
//! [`ReactiveArray`] is an ordered sequence whose in-place mutations are
//! observable. Only the seven mutating operations are intercepted:
//! `push`, `pop`, `shift`, `unshift`, `splice`, `sort_by` and `reverse`
//! (`extend` is `push` with several values). Each call performs the
//! mutation, observes the inserted elements and then notifies the array's own
//! dependency set exactly once.
//!
//! Operations that only read, or that build a new sequence (`slice`,
//! `concat`), are not intercepted.
//!
//! There is deliberately no index assignment and no truncation: use
//! [`set`](super::set) / [`delete`](super::delete) to replace or remove an
//! element observably.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;

use super::observer::Observer;
use super::value::Value;

#[derive(Default)]
struct ArrayData {
    items: Vec<Value>,
    observer: Option<Observer>,
    frozen: bool,
    raw: bool,
}

/// A shared, observable sequence of values.
#[derive(Clone, Default)]
pub struct ReactiveArray {
    inner: Arc<RwLock<ArrayData>>,
}

impl ReactiveArray {
    /// Create an empty, unobserved array.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads (subscribe the running watcher to the array)
    // ------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Option<Value> {
        self.depend();
        self.inner.read().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.depend();
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.depend();
        self.to_vec_untracked()
    }

    /// New unobserved array holding a copy of `range` (clamped to the
    /// array's bounds).
    pub fn slice(&self, range: Range<usize>) -> ReactiveArray {
        self.depend();
        let data = self.inner.read();
        let end = range.end.min(data.items.len());
        let start = range.start.min(end);
        data.items[start..end].iter().cloned().collect()
    }

    /// New unobserved array holding this array's elements followed by
    /// `other`'s.
    pub fn concat(&self, other: &ReactiveArray) -> ReactiveArray {
        let mut items = self.to_vec();
        items.extend(other.to_vec());
        items.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Intercepted mutations
    // ------------------------------------------------------------------

    /// Append a value. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        self.extend([value.into()])
    }

    /// Append several values with a single notification. Returns the new
    /// length.
    pub fn extend<I: IntoIterator<Item = Value>>(&self, values: I) -> usize {
        let inserted: Vec<Value> = values.into_iter().collect();
        self.mutate(|items| {
            items.extend(inserted.iter().cloned());
            (items.len(), inserted)
        })
        .unwrap_or_else(|| self.len_untracked())
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        self.mutate(|items| (items.pop(), Vec::new())).flatten()
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        self.mutate(|items| {
            let first = (!items.is_empty()).then(|| items.remove(0));
            (first, Vec::new())
        })
        .flatten()
    }

    /// Insert a value at the front. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.insert(0, value.clone());
            (items.len(), vec![value])
        })
        .unwrap_or_else(|| self.len_untracked())
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `items` in their place. `start` and `delete_count` are clamped to the
    /// array's bounds. Returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        self.mutate(|current| {
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            let removed: Vec<Value> = current.splice(start..end, items.iter().cloned()).collect();
            (removed, items)
        })
        .unwrap_or_default()
    }

    /// Sort in place with a comparator.
    ///
    /// The comparator runs on a copy of the elements, so it may read this
    /// array without deadlocking.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.to_vec_untracked();
        sorted.sort_by(&mut compare);
        self.mutate(move |items| {
            *items = sorted;
            ((), Vec::new())
        });
    }

    /// Sort in place: nulls first, then booleans, numbers, strings, and
    /// containers (which keep their relative order).
    pub fn sort(&self) {
        self.sort_by(default_order);
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.mutate(|items| {
            items.reverse();
            ((), Vec::new())
        });
    }

    // ------------------------------------------------------------------
    // Flags and internals
    // ------------------------------------------------------------------

    /// Make the array immutable. Frozen arrays are never observed and
    /// silently ignore mutations.
    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// Mark the array as non-reactive. It stays mutable but is never
    /// observed.
    pub fn mark_raw(&self) {
        self.inner.write().raw = true;
    }

    pub fn is_raw(&self) -> bool {
        self.inner.read().raw
    }

    pub fn observer(&self) -> Option<Observer> {
        self.inner.read().observer.clone()
    }

    /// Whether both handles refer to the same array.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach_observer(&self, observer: &Observer) -> Option<Observer> {
        let mut data = self.inner.write();
        if let Some(existing) = &data.observer {
            return Some(existing.clone());
        }
        if data.frozen || data.raw {
            return None;
        }
        data.observer = Some(observer.clone());
        Some(observer.clone())
    }

    pub(crate) fn to_vec_untracked(&self) -> Vec<Value> {
        self.inner.read().items.clone()
    }

    pub(crate) fn len_untracked(&self) -> usize {
        self.inner.read().items.len()
    }

    fn depend(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }

    /// Apply a mutation, then observe whatever it inserted and notify once.
    ///
    /// Returns `None` if the array is frozen.
    fn mutate<R>(&self, op: impl FnOnce(&mut Vec<Value>) -> (R, Vec<Value>)) -> Option<R> {
        let (result, inserted, observer) = {
            let mut data = self.inner.write();
            if data.frozen {
                tracing::debug!("ignoring mutation of frozen array");
                return None;
            }
            let (result, inserted) = op(&mut data.items);
            (result, inserted, data.observer.clone())
        };

        if let Some(observer) = observer {
            if let Some(runtime) = observer.runtime() {
                for value in &inserted {
                    runtime.observe(value);
                }
            }
            observer.dep().notify();
        }
        Some(result)
    }
}

fn default_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Object(_) | Value::Array(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

impl<V: Into<Value>> FromIterator<V> for ReactiveArray {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ArrayData {
                items: iter.into_iter().map(Into::into).collect(),
                ..ArrayData::default()
            })),
        }
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec_untracked()).finish()
    }
}
