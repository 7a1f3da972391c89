//! Values and Observable Objects
//!
//! [`Value`] is the dynamic data model the engine observes. Primitive values
//! are plain data; mappings ([`ReactiveObject`]) and ordered sequences
//! ([`ReactiveArray`]) are shared containers that become observable once a
//! [`Runtime`](super::Runtime) observes them.
//!
//! # Interception
//!
//! Containers are built through this API, so every read and write goes
//! through [`ReactiveObject::get`] / [`ReactiveObject::set`]. Once a property
//! has been made reactive it owns a [`Dep`]:
//!
//! - `get` records an edge between the running watcher and the property, and
//!   between the watcher and the value's own container set, so replacing or
//!   mutating a nested container is observed too.
//! - `set` is a no-op when the new value equals the old one, observes the new
//!   value, then notifies the property's subscribers.
//!
//! Keys inserted into an already observed object with a plain `set` are
//! stored but are **not** reactive; use [`set`](super::set) to add a reactive
//! key.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::array::ReactiveArray;
use super::observer::{track_read, Observer};
use super::runtime::Runtime;
use crate::graph::Dep;

/// A dynamically typed value.
///
/// Cloning a container variant yields another handle to the same container.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ReactiveObject),
    Array(ReactiveArray),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(entries.into_iter().collect())
    }

    /// Build an array value.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Mappings and sequences are containers; everything else is primitive.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The container's observer, if the value is an observed container.
    pub fn observer(&self) -> Option<Observer> {
        match self {
            Value::Object(object) => object.observer(),
            Value::Array(array) => array.observer(),
            _ => None,
        }
    }

    /// Untracked snapshot of the value as JSON.
    ///
    /// Non-finite floats become `null`, and so does a container that
    /// contains itself.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, ancestors: &mut Vec<Value>) -> serde_json::Value {
        if self.is_container() {
            // Containers compare by identity.
            if ancestors.contains(self) {
                return serde_json::Value::Null;
            }
            ancestors.push(self.clone());
        }
        let json = match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => serde_json::Value::Object(
                object
                    .entries_untracked()
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json_inner(ancestors)))
                    .collect(),
            ),
            Value::Array(array) => serde_json::Value::Array(
                array
                    .to_vec_untracked()
                    .iter()
                    .map(|item| item.to_json_inner(ancestors))
                    .collect(),
            ),
        };
        if self.is_container() {
            ancestors.pop();
        }
        json
    }
}

/// Primitives compare by value, containers by identity.
///
/// This is the comparison used to decide whether a write changed anything:
/// `NaN` is equal to itself so re-assigning `NaN` does not notify.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(object) => object.fmt(f),
            Value::Array(array) => array.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<ReactiveObject> for Value {
    fn from(value: ReactiveObject) -> Self {
        Value::Object(value)
    }
}

impl From<ReactiveArray> for Value {
    fn from(value: ReactiveArray) -> Self {
        Value::Array(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}

// ----------------------------------------------------------------------------
// Objects
// ----------------------------------------------------------------------------

/// One key of an object. `dep` is present once the key has been made
/// reactive.
pub(crate) struct Property {
    pub(crate) value: Value,
    pub(crate) dep: Option<Dep>,
}

#[derive(Default)]
pub(crate) struct ObjectData {
    pub(crate) props: IndexMap<String, Property>,
    pub(crate) observer: Option<Observer>,
    pub(crate) frozen: bool,
    pub(crate) raw: bool,
}

/// A shared mapping from string keys to values, in insertion order.
#[derive(Clone, Default)]
pub struct ReactiveObject {
    inner: Arc<RwLock<ObjectData>>,
}

impl ReactiveObject {
    /// Create an empty, unobserved object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key.
    ///
    /// When the key is reactive and a watcher is running, the watcher is
    /// subscribed to the key (and to the value's own container set).
    pub fn get(&self, key: &str) -> Option<Value> {
        let (value, dep) = {
            let data = self.inner.read();
            let property = data.props.get(key)?;
            (property.value.clone(), property.dep.clone())
        };
        if let Some(dep) = dep {
            track_read(&dep, &value);
        }
        Some(value)
    }

    /// Write a key.
    ///
    /// Reactive keys notify their subscribers when the value changes. Other
    /// keys, including new ones, are plain stores. Writes to a frozen object
    /// are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let dep = {
            let mut data = self.inner.write();
            if data.frozen {
                tracing::debug!(key, "ignoring write to frozen object");
                return;
            }
            match data.props.get_mut(key) {
                Some(property) => {
                    if property.dep.is_some() && property.value == value {
                        return;
                    }
                    property.value = value.clone();
                    property.dep.clone()
                }
                None => {
                    data.props
                        .insert(key.to_string(), Property { value: value.clone(), dep: None });
                    None
                }
            }
        };

        if let Some(dep) = dep {
            if let Some(runtime) = dep.runtime() {
                runtime.observe(&value);
            }
            dep.notify();
        }
    }

    /// Whether the object has the key. Not tracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().props.contains_key(key)
    }

    /// The object's keys, subscribing the running watcher to the object's
    /// own set (so added and deleted keys are observed).
    pub fn keys(&self) -> Vec<String> {
        self.depend_container();
        self.inner.read().props.keys().cloned().collect()
    }

    /// Number of keys. Tracked like [`keys`](Self::keys).
    pub fn len(&self) -> usize {
        self.depend_container();
        self.inner.read().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a key has been made reactive.
    pub fn is_reactive(&self, key: &str) -> bool {
        self.inner
            .read()
            .props
            .get(key)
            .is_some_and(|property| property.dep.is_some())
    }

    /// Make the object immutable. Frozen objects are never observed and
    /// silently ignore writes.
    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// Mark the object as non-reactive. It stays mutable but is never
    /// observed.
    pub fn mark_raw(&self) {
        self.inner.write().raw = true;
    }

    pub fn is_raw(&self) -> bool {
        self.inner.read().raw
    }

    /// The object's observer, if it has been observed.
    pub fn observer(&self) -> Option<Observer> {
        self.inner.read().observer.clone()
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Turn `key` into a reactive property holding `value`, observing the
    /// value. Does not notify.
    pub fn define_reactive(&self, runtime: &Runtime, key: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut data = self.inner.write();
            if data.frozen {
                return;
            }
            let dep = match data.props.get(key).and_then(|property| property.dep.clone()) {
                Some(dep) => dep,
                None => Dep::new(runtime),
            };
            data.props.insert(key.to_string(), Property { value: value.clone(), dep: Some(dep) });
        }
        runtime.observe(&value);
    }

    /// Attach an observer unless the object is frozen, raw or already
    /// observed. Returns the observer now attached, if any.
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

    /// Remove a key without notifying anyone.
    pub(crate) fn remove_untracked(&self, key: &str) -> Option<Value> {
        let mut data = self.inner.write();
        if data.frozen {
            return None;
        }
        data.props.shift_remove(key).map(|property| property.value)
    }

    /// Snapshot of all entries, without tracking.
    pub(crate) fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.inner
            .read()
            .props
            .iter()
            .map(|(key, property)| (key.clone(), property.value.clone()))
            .collect()
    }

    fn depend_container(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ReactiveObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let props = iter
            .into_iter()
            .map(|(key, value)| (key.into(), Property { value: value.into(), dep: None }))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(ObjectData { props, ..ObjectData::default() })),
        }
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries_untracked()).finish()
    }
}
