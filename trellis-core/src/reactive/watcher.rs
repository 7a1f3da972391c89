//! Watcher Implementation
//!
//! A Watcher is one unit of derived work. It wraps a getter (a body that
//! reads reactive state and produces a [`Value`]) and, optionally, a callback
//! fired with `(new, old)` whenever a re-run produces a changed value.
//!
//! # Flavors
//!
//! - **Eager** watchers run their getter on construction and are queued on
//!   the runtime's scheduler whenever a dependency changes.
//! - **Sync** watchers re-run immediately on notification.
//! - **Lazy** watchers (computed values) do nothing until their value is
//!   requested; a notification only marks them dirty.
//!
//! # Dependency bookkeeping
//!
//! Every run records the dependency sets read during that run in `new_deps`.
//! When the run completes, sets that were not read again are unsubscribed and
//! `new_deps` becomes the current dependency set. A dependency read many times
//! during one run is recorded once.
//!
//! # Failure semantics
//!
//! A getter failing on the first run or in [`Watcher::evaluate`] is returned
//! to the caller. Failures during a scheduled re-run, and any callback
//! failure, are routed through the runtime's error handling instead, so one
//! failing watcher does not abort the flush.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use smallvec::SmallVec;

use super::runtime::Runtime;
use super::scope::{Scope, WeakScope};
use super::subscriber::SubscriberId;
use super::value::Value;
use crate::error::{BoxError, ReactiveError};
use crate::graph::{Dep, DepId};

/// Body of a watcher.
pub type Getter = Arc<dyn Fn() -> Result<Value, BoxError> + Send + Sync>;

/// Callback fired with `(new_value, old_value)`.
pub type Callback = Arc<dyn Fn(&Value, &Value) -> Result<(), BoxError> + Send + Sync>;

/// Hook without arguments (before-run and after-flush hooks).
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Behavior flags for a watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Compute on demand and cache (computed value).
    pub lazy: bool,
    /// Re-run immediately on notification instead of queueing.
    pub sync: bool,
    /// Created by user code (`watch`), as opposed to engine internals.
    pub user: bool,
    /// Also track everything reachable from the result; the callback fires on
    /// every re-run.
    pub deep: bool,
    /// Fire the callback once right after construction.
    pub immediate: bool,
}

/// A reactive computation.
///
/// Cloning a `Watcher` creates a new handle to the same computation. An
/// eager watcher keeps running until [`teardown`](Self::teardown), even after
/// every handle is dropped.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

pub(crate) struct WatcherInner {
    id: SubscriberId,
    runtime: Runtime,
    expression: String,
    getter: Getter,
    callback: Option<Callback>,
    options: WatchOptions,
    before: Option<Hook>,
    after_flush: Option<Hook>,
    owner: Option<WeakScope>,
    state: Mutex<WatcherState>,
}

struct WatcherState {
    value: Value,
    dirty: bool,
    active: bool,
    deps: IndexMap<DepId, Dep>,
    new_deps: IndexMap<DepId, Dep>,
}

impl Watcher {
    /// Get the watcher's unique ID (also its creation rank).
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Label used in diagnostics.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn options(&self) -> WatchOptions {
        self.inner.options
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The scope owning this watcher, if it is still alive.
    pub fn owner(&self) -> Option<Scope> {
        self.inner.owner.as_ref().and_then(WeakScope::upgrade)
    }

    /// The last computed value (`Null` for a lazy watcher never evaluated).
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    /// Whether a lazy watcher's cached value is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    /// `false` once torn down.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Number of dependency sets the watcher is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.state.lock().deps.len()
    }

    /// Recompute a lazy watcher's value if it is dirty.
    ///
    /// Getter failures are returned, and the watcher stays dirty so the next
    /// call retries.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        {
            let mut state = self.inner.state.lock();
            if !state.dirty {
                return Ok(());
            }
            // Cleared up front so a change made during the run marks it again.
            state.dirty = false;
        }
        match self.get() {
            Ok(value) => {
                self.inner.state.lock().value = value;
                Ok(())
            }
            Err(source) => {
                self.inner.state.lock().dirty = true;
                Err(ReactiveError::Evaluation {
                    info: self.getter_info(),
                    source,
                })
            }
        }
    }

    /// Subscribe the currently running watcher to everything this watcher
    /// depends on, so a computation reading this one's cached value is
    /// notified by the underlying state.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.inner.state.lock().deps.values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// React to a dependency change.
    ///
    /// Lazy watchers become dirty, sync watchers re-run now, and everything
    /// else is queued on the scheduler.
    pub fn update(&self) {
        if !self.is_active() {
            return;
        }
        if self.inner.options.lazy {
            self.inner.state.lock().dirty = true;
        } else if self.inner.options.sync {
            if let Err(err) = self.run() {
                tracing::error!(watcher = %self.id(), error = %err, "unhandled error in sync watcher");
            }
        } else {
            self.inner.runtime.queue_watcher(self.clone());
        }
    }

    /// Re-run the getter and fire the callback if the value changed.
    ///
    /// Primitive results are compared by value; container results (and deep
    /// watchers) always count as changed. Failures are contained; `Err` is
    /// only returned when error handling decides the error must surface.
    pub fn run(&self) -> Result<(), ReactiveError> {
        if !self.is_active() {
            return Ok(());
        }
        let value = match self.get() {
            Ok(value) => value,
            Err(source) => {
                let err = ReactiveError::Evaluation {
                    info: self.getter_info(),
                    source,
                };
                return self.inner.runtime.handle_error(err, self.owner().as_ref());
            }
        };

        let old = {
            let mut state = self.inner.state.lock();
            state.dirty = false;
            let changed = value != state.value || value.is_container() || self.inner.options.deep;
            if !changed {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        match &self.inner.callback {
            Some(callback) => self.invoke_callback(callback, &value, &old, "callback for watcher"),
            None => Ok(()),
        }
    }

    /// Unsubscribe from every dependency set. Idempotent; a torn-down
    /// watcher never runs again.
    pub fn teardown(&self) {
        let (deps, new_deps) = {
            let mut state = self.inner.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            (std::mem::take(&mut state.deps), std::mem::take(&mut state.new_deps))
        };
        for dep in deps.values().chain(new_deps.values()) {
            dep.remove_sub(self.id());
        }
        if let Some(owner) = self.owner() {
            owner.forget(self.id());
        }
        self.inner.runtime.release_watcher(self.id());
        tracing::trace!(watcher = %self.id(), "teardown");
    }

    /// Record a dependency read during the current run.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let mut state = self.inner.state.lock();
        if !state.active {
            return;
        }
        let id = dep.id();
        if state.new_deps.contains_key(&id) {
            return;
        }
        state.new_deps.insert(id, dep.clone());
        if !state.deps.contains_key(&id) {
            dep.add_sub(self);
        }
    }

    pub(crate) fn call_before(&self) {
        if let Some(before) = &self.inner.before {
            before();
        }
    }

    pub(crate) fn call_after_flush(&self) {
        if let Some(after) = &self.inner.after_flush {
            if self.is_active() {
                after();
            }
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<WatcherInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<WatcherInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Run the getter with this watcher as the current context.
    fn get(&self) -> Result<Value, BoxError> {
        let result = {
            let _ctx = self.inner.runtime.context().enter(Some(self.clone()));
            let result = (self.inner.getter)();
            if self.inner.options.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();
        result
    }

    /// Drop subscriptions that were not renewed by the last run.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut state = self.inner.state.lock();
            let new_deps = std::mem::take(&mut state.new_deps);
            if !state.active {
                new_deps.into_values().collect()
            } else {
                let old = std::mem::replace(&mut state.deps, new_deps);
                old.into_iter()
                    .filter(|(id, _)| !state.deps.contains_key(id))
                    .map(|(_, dep)| dep)
                    .collect()
            }
        };
        for dep in stale {
            dep.remove_sub(self.id());
        }
    }

    fn invoke_callback(
        &self,
        callback: &Callback,
        value: &Value,
        old: &Value,
        what: &str,
    ) -> Result<(), ReactiveError> {
        match callback(value, old) {
            Ok(()) => Ok(()),
            Err(source) => {
                let err = ReactiveError::Callback {
                    info: format!("{what} \"{}\"", self.inner.expression),
                    source,
                };
                self.inner.runtime.handle_error(err, self.owner().as_ref())
            }
        }
    }

    fn getter_info(&self) -> String {
        format!("getter for watcher \"{}\"", self.inner.expression)
    }
}

impl PartialEq for Watcher {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Watcher {}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("options", &self.inner.options)
            .field("dirty", &state.dirty)
            .field("active", &state.active)
            .field("dependency_count", &state.deps.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Configures and creates a [`Watcher`]. Obtained from
/// [`Runtime::watcher`] or [`Scope::watcher`].
#[must_use = "a watcher is only created by `build`"]
pub struct WatcherBuilder {
    runtime: Runtime,
    getter: Getter,
    callback: Option<Callback>,
    options: WatchOptions,
    before: Option<Hook>,
    after_flush: Option<Hook>,
    owner: Option<Scope>,
    expression: Option<String>,
}

impl WatcherBuilder {
    pub(crate) fn new(runtime: Runtime, getter: Getter) -> Self {
        Self {
            runtime,
            getter,
            callback: None,
            options: WatchOptions::default(),
            before: None,
            after_flush: None,
            owner: None,
            expression: None,
        }
    }

    /// Callback fired with `(new, old)` after a re-run changes the value.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub(crate) fn callback_arc(mut self, callback: Option<Callback>) -> Self {
        self.callback = callback;
        self
    }

    /// Replace all flags at once.
    pub fn options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.options.lazy = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.options.sync = true;
        self
    }

    pub fn user(mut self) -> Self {
        self.options.user = true;
        self
    }

    pub fn deep(mut self) -> Self {
        self.options.deep = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.options.immediate = true;
        self
    }

    /// Hook run right before the watcher re-runs inside a flush.
    pub fn before<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Hook run once after a flush in which the watcher ran.
    pub fn after_flush<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.after_flush = Some(Arc::new(hook));
        self
    }

    /// Attach the watcher to a scope: it is torn down with the scope and its
    /// errors are offered to the scope's ancestors.
    pub fn owner(mut self, scope: &Scope) -> Self {
        self.owner = Some(scope.clone());
        self
    }

    /// Label used in diagnostics.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Create the watcher. Eager watchers run their getter now; a failure is
    /// returned and the watcher is torn down.
    pub fn build(self) -> Result<Watcher, ReactiveError> {
        let watcher = self.construct();
        let lazy = watcher.inner.options.lazy;

        if !lazy {
            match watcher.get() {
                Ok(value) => watcher.inner.state.lock().value = value,
                Err(source) => {
                    watcher.teardown();
                    return Err(ReactiveError::Evaluation {
                        info: watcher.getter_info(),
                        source,
                    });
                }
            }
        }

        if watcher.inner.options.immediate {
            if let Some(callback) = &watcher.inner.callback {
                let value = watcher.value();
                if let Err(err) =
                    watcher.invoke_callback(callback, &value, &Value::Null, "callback for immediate watcher")
                {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }

        tracing::trace!(watcher = %watcher.id(), expression = watcher.expression(), lazy, "created watcher");
        Ok(watcher)
    }

    /// Create a lazy watcher. Nothing runs, so this cannot fail.
    pub(crate) fn build_lazy(mut self) -> Watcher {
        self.options.lazy = true;
        self.options.immediate = false;
        let watcher = self.construct();
        tracing::trace!(watcher = %watcher.id(), expression = watcher.expression(), "created lazy watcher");
        watcher
    }

    fn construct(self) -> Watcher {
        let id = SubscriberId::new();
        let lazy = self.options.lazy;
        let watcher = Watcher {
            inner: Arc::new(WatcherInner {
                id,
                expression: self.expression.unwrap_or_else(|| format!("watcher {id}")),
                runtime: self.runtime,
                getter: self.getter,
                callback: self.callback,
                options: self.options,
                before: self.before,
                after_flush: self.after_flush,
                owner: self.owner.as_ref().map(Scope::downgrade),
                state: Mutex::new(WatcherState {
                    value: Value::Null,
                    dirty: lazy,
                    active: true,
                    deps: IndexMap::new(),
                    new_deps: IndexMap::new(),
                }),
            }),
        };

        match &self.owner {
            Some(owner) => owner.adopt(watcher.clone()),
            None if !lazy => watcher.inner.runtime.retain_watcher(watcher.clone()),
            None => {}
        }
        watcher
    }
}

// ----------------------------------------------------------------------------
// Deep traversal and path getters
// ----------------------------------------------------------------------------

/// Read everything reachable from `value` so the running watcher subscribes
/// to all of it.
fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<DepId>) {
    if let Some(observer) = value.observer() {
        if !seen.insert(observer.dep().id()) {
            return;
        }
    }
    match value {
        Value::Object(object) if !object.is_frozen() => {
            for key in object.keys() {
                if let Some(child) = object.get(&key) {
                    traverse_inner(&child, seen);
                }
            }
        }
        Value::Array(array) if !array.is_frozen() => {
            for item in array.to_vec() {
                traverse_inner(&item, seen);
            }
        }
        _ => {}
    }
}

type PathSegments = SmallVec<[String; 4]>;

/// Split a dot-separated path such as `user.tags.0`. Paths containing
/// anything but word characters, `$` and `.` are rejected.
fn parse_path(path: &str) -> Option<PathSegments> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
    valid.then(|| path.split('.').map(str::to_string).collect())
}

fn read_path(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Object(object) => object.get(segment).unwrap_or_default(),
            Value::Array(array) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| array.get(index))
                .unwrap_or_default(),
            _ => return Value::Null,
        };
    }
    current
}

/// Build a getter reading `path` from `root`. Invalid paths log a warning and
/// yield a getter that always returns `Null`.
pub(crate) fn path_getter(root: &Value, path: &str) -> Getter {
    match parse_path(path) {
        Some(segments) => {
            let root = root.clone();
            Arc::new(move || Ok(read_path(&root, &segments)))
        }
        None => {
            tracing::warn!(
                path,
                "failed watching path: only simple dot-delimited paths are supported, use a getter instead"
            );
            Arc::new(|| Ok(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn eager_watcher_runs_on_creation() {
        let runtime = Runtime::new();
        let (runs, runs_clone) = counter();
        let watcher = runtime
            .watcher(move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Int(7))
            })
            .build()
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.value(), Value::Int(7));
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn lazy_watcher_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let (runs, runs_clone) = counter();
        let watcher = runtime
            .watcher(move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Int(1))
            })
            .lazy()
            .build()
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(watcher.is_dirty());
        assert_eq!(watcher.value(), Value::Null);

        watcher.evaluate().unwrap();
        watcher.evaluate().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.value(), Value::Int(1));
    }

    #[test]
    fn repeated_reads_record_one_dependency() {
        let runtime = Runtime::new();
        let state = Value::object([("a", 1)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();

        let watcher = runtime
            .watcher(move || {
                let a = object.get("a").unwrap_or_default();
                let _ = object.get("a");
                let _ = object.get("a");
                Ok(a)
            })
            .build()
            .unwrap();

        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let runtime = Runtime::new();
        let state = Value::object([("flag", Value::Bool(true)), ("a", 1.into()), ("b", 2.into())]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();
        let (runs, runs_clone) = counter();

        let watcher = runtime
            .watcher(move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                let flag = reader.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
                Ok(if flag { reader.get("a") } else { reader.get("b") }.unwrap_or_default())
            })
            .sync()
            .build()
            .unwrap();
        assert_eq!(watcher.value(), Value::Int(1));

        object.set("flag", false);
        assert_eq!(watcher.value(), Value::Int(2));
        assert_eq!(watcher.dependency_count(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // "a" was dropped from the dependencies by the last run.
        object.set("a", 10);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        object.set("b", 20);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(watcher.value(), Value::Int(20));
    }

    #[test]
    fn teardown_is_idempotent_and_final() {
        let runtime = Runtime::new();
        let state = Value::object([("a", 1)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();
        let (runs, runs_clone) = counter();

        let watcher = runtime
            .watcher(move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(reader.get("a").unwrap_or_default())
            })
            .sync()
            .build()
            .unwrap();
        assert_eq!(watcher.dependency_count(), 1);

        watcher.teardown();
        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(watcher.dependency_count(), 0);

        object.set("a", 2);
        assert!(watcher.run().is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_first_run_is_returned() {
        let runtime = Runtime::new();
        let err = runtime
            .watcher(|| Err("bad getter".into()))
            .expression("broken")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReactiveError::Evaluation { .. }));
        assert_eq!(err.to_string(), "error in getter for watcher \"broken\": bad getter");
    }

    #[test]
    fn failing_lazy_evaluation_stays_dirty() {
        let runtime = Runtime::new();
        let (attempts, attempts_clone) = counter();
        let watcher = runtime
            .watcher(move || {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first attempt fails".into())
                } else {
                    Ok(Value::Int(3))
                }
            })
            .lazy()
            .build()
            .unwrap();

        assert!(watcher.evaluate().is_err());
        assert!(watcher.is_dirty());
        watcher.evaluate().unwrap();
        assert_eq!(watcher.value(), Value::Int(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn change_during_lazy_evaluation_keeps_it_dirty() {
        let runtime = Runtime::new();
        let state = Value::object([("n", 0)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();

        let watcher = runtime
            .watcher(move || {
                let n = object.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                if n == 0 {
                    object.set("n", 1);
                }
                Ok(Value::Int(n))
            })
            .lazy()
            .build()
            .unwrap();

        watcher.evaluate().unwrap();
        assert_eq!(watcher.value(), Value::Int(0));
        assert!(watcher.is_dirty());

        watcher.evaluate().unwrap();
        assert_eq!(watcher.value(), Value::Int(1));
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn context_is_restored_after_failure() {
        let runtime = Runtime::new();
        let _ = runtime.watcher(|| Err("boom".into())).build();
        assert_eq!(runtime.context().depth(), 0);
        assert!(!runtime.is_tracking());
    }

    #[test]
    fn path_parsing() {
        assert_eq!(parse_path("a.b.0").unwrap().as_slice(), ["a", "b", "0"]);
        assert!(parse_path("$data.x_1").is_some());
        assert!(parse_path("a[0]").is_none());
        assert!(parse_path("a + b").is_none());
    }

    #[test]
    fn read_path_walks_objects_and_arrays() {
        let root = Value::from(serde_json::json!({ "user": { "tags": ["x", "y"] } }));
        let segments = parse_path("user.tags.1").unwrap();
        assert_eq!(read_path(&root, &segments), Value::from("y"));

        let missing = parse_path("user.name.first").unwrap();
        assert_eq!(read_path(&root, &missing), Value::Null);
    }
}
