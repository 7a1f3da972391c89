//! Observers
//!
//! An [`Observer`] is attached to every observed container. It owns the
//! container's own dependency set, which is notified when the container's
//! shape changes (keys added or deleted, array mutated) rather than when one
//! property is reassigned.
//!
//! Observing walks the container once: every key of an object becomes a
//! reactive property, every element of an array is observed in turn.
//! Observing an already observed container returns its existing observer.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::runtime::Runtime;
use super::value::Value;
use super::ReactiveArray;
use crate::graph::{Dep, DepId};

/// The observation record attached to a container.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    dep: Dep,
    /// Number of scopes holding this container as their root state.
    root_count: AtomicUsize,
}

impl Observer {
    fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                dep: Dep::new(runtime),
                root_count: AtomicUsize::new(0),
            }),
        }
    }

    /// The container's own dependency set.
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    /// The runtime that observed the container.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.dep.runtime()
    }

    /// How many owners hold the container as root state.
    pub fn root_count(&self) -> usize {
        self.inner.root_count.load(Ordering::Relaxed)
    }

    pub fn is_root(&self) -> bool {
        self.root_count() > 0
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// An owner holding the container as root state went away.
    pub(crate) fn release_root(&self) {
        let _ = self
            .inner
            .root_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| count.checked_sub(1));
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.inner.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Observe `value`, returning its observer.
///
/// Returns `None` for primitives, frozen or raw containers, and whenever
/// observation is switched off on the runtime. Already observed containers
/// return their existing observer (idempotent).
pub(crate) fn observe(runtime: &Runtime, value: &Value, as_root: bool) -> Option<Observer> {
    let observer = match value {
        Value::Object(object) => match object.observer() {
            Some(existing) => existing,
            None => {
                if !runtime.should_observe() {
                    return None;
                }
                let candidate = Observer::new(runtime);
                let attached = object.attach_observer(&candidate)?;
                if attached.ptr_eq(&candidate) {
                    tracing::debug!(dep = candidate.dep().id().raw(), "observing object");
                    for (key, child) in object.entries_untracked() {
                        object.define_reactive(runtime, &key, child);
                    }
                }
                attached
            }
        },
        Value::Array(array) => match array.observer() {
            Some(existing) => existing,
            None => {
                if !runtime.should_observe() {
                    return None;
                }
                let candidate = Observer::new(runtime);
                let attached = array.attach_observer(&candidate)?;
                if attached.ptr_eq(&candidate) {
                    tracing::debug!(dep = candidate.dep().id().raw(), "observing array");
                    for item in array.to_vec_untracked() {
                        observe(runtime, &item, false);
                    }
                }
                attached
            }
        },
        _ => return None,
    };

    if as_root {
        observer.inner.root_count.fetch_add(1, Ordering::Relaxed);
    }
    Some(observer)
}

/// Subscribe the running watcher to a reactive property and, transitively,
/// to the container it holds.
pub(crate) fn track_read(dep: &Dep, value: &Value) {
    let Some(runtime) = dep.runtime() else {
        return;
    };
    if !runtime.is_tracking() {
        return;
    }
    dep.depend();
    if let Some(child) = value.observer() {
        child.dep().depend();
        if let Value::Array(items) = value {
            let mut seen = HashSet::from([child.dep().id()]);
            depend_array(items, &mut seen);
        }
    }
}

/// Element reads are not intercepted individually, so a watcher reading an
/// array subscribes to every nested container in it up front.
fn depend_array(array: &ReactiveArray, seen: &mut HashSet<DepId>) {
    for item in array.to_vec_untracked() {
        if let Some(observer) = item.observer() {
            if !seen.insert(observer.dep().id()) {
                continue;
            }
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested, seen);
        }
    }
}

// ----------------------------------------------------------------------------
// Set / delete with observation
// ----------------------------------------------------------------------------

/// Key of a container: a property name or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Set a key on a container, making it reactive if it is new.
///
/// - Arrays: the element at the index is replaced (the array is padded with
///   `Null` first if needed) through `splice`, so subscribers are notified.
/// - Objects: existing keys are assigned normally. New keys on an observed
///   object become reactive properties and the object's own set is
///   notified. Objects held as root state refuse new keys.
///
/// Returns the value that was set.
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
    let key = key.into();
    let value = value.into();
    match (target, &key) {
        (Value::Array(array), Key::Index(index)) => {
            let len = array.len_untracked();
            if *index >= len {
                let mut padded = vec![Value::Null; index - len];
                padded.push(value.clone());
                array.splice(len, 0, padded);
            } else {
                array.splice(*index, 1, vec![value.clone()]);
            }
        }
        (Value::Object(object), Key::Name(name)) => {
            if object.contains_key(name) {
                object.set(name, value.clone());
                return value;
            }
            let Some(observer) = object.observer() else {
                object.set(name, value.clone());
                return value;
            };
            if observer.is_root() {
                tracing::warn!(
                    key = %name,
                    "avoid adding reactive properties to root state at runtime; declare it upfront"
                );
                return value;
            }
            let Some(runtime) = observer.runtime() else {
                object.set(name, value.clone());
                return value;
            };
            object.define_reactive(&runtime, name, value.clone());
            observer.dep().notify();
        }
        _ => {
            tracing::warn!(%key, target = ?target, "cannot set reactive property on this value");
        }
    }
    value
}

/// Delete a key from a container, notifying when something was removed.
///
/// Deleting a missing key is a no-op and notifies nobody. Objects held as
/// root state refuse deletion.
pub fn delete(target: &Value, key: impl Into<Key>) {
    let key = key.into();
    match (target, &key) {
        (Value::Array(array), Key::Index(index)) => {
            if *index >= array.len_untracked() {
                return;
            }
            array.splice(*index, 1, Vec::new());
        }
        (Value::Object(object), Key::Name(name)) => {
            let observer = object.observer();
            if observer.as_ref().is_some_and(Observer::is_root) {
                tracing::warn!(key = %name, "avoid deleting properties of root state");
                return;
            }
            if object.remove_untracked(name).is_none() {
                return;
            }
            if let Some(observer) = observer {
                observer.dep().notify();
            }
        }
        _ => {
            tracing::warn!(%key, target = ?target, "cannot delete reactive property on this value");
        }
    }
}
