//! Reactive Runtime
//!
//! The runtime is the engine instance that connects observed data, watchers
//! and the update scheduler.
//!
//! # How It Works
//!
//! 1. Data is observed with [`Runtime::observe`]; every dependency set created
//!    for it remembers the runtime.
//!
//! 2. When a watcher runs, the runtime's context stack records it as the
//!    current watcher, and every reactive read subscribes it.
//!
//! 3. When a property changes, its dependency set notifies its subscribers:
//!    a. Lazy watchers are marked dirty and recompute on next access
//!    b. Sync watchers re-run immediately
//!    c. Everything else is queued on the scheduler
//!
//! 4. [`Runtime::flush`] (or [`Runtime::tick`], or a spawned
//!    [`Runtime::flush_loop`]) drains the queue.
//!
//! # Thread Safety
//!
//! `Runtime` is a cheap handle around shared state protected by
//! `parking_lot` locks. No lock is held while user code runs, so a body may
//! freely read and write reactive state, including state that triggers its
//! own watcher again.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use super::capture::{self, ErrorHandler};
use super::computed::Computed;
use super::context::ContextStack;
use super::observer::{self, Observer};
use super::scope::Scope;
use super::subscriber::SubscriberId;
use super::value::Value;
use super::watcher::{path_getter, Hook, WatchOptions, Watcher, WatcherBuilder};
use crate::config::EngineConfig;
use crate::error::{BoxError, ReactiveError};
use crate::graph::scheduler::{self, Enqueued};
use crate::graph::{FlushHookId, FlushSummary, UpdateScheduler};

/// Handle to a reactive engine instance.
///
/// Cloning a `Runtime` creates a new handle to the same engine.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    config: EngineConfig,
    context: ContextStack,
    observing: AtomicBool,
    retained: DashMap<SubscriberId, Watcher>,
    scheduler: Mutex<UpdateScheduler>,
    flush_pending: Notify,
    flush_hooks: RwLock<Vec<(FlushHookId, Hook)>>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                context: ContextStack::new(),
                observing: AtomicBool::new(true),
                retained: DashMap::new(),
                scheduler: Mutex::new(UpdateScheduler::new()),
                flush_pending: Notify::new(),
                flush_hooks: RwLock::new(Vec::new()),
                error_handler: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Make a container (and everything reachable from it) reactive.
    ///
    /// Returns `None` for primitives and for frozen or raw containers.
    pub fn observe(&self, value: &Value) -> Option<Observer> {
        observer::observe(self, value, false)
    }

    /// Observe a container as the root state of an owner. Root state refuses
    /// reactive key additions and deletions.
    pub fn observe_root(&self, value: &Value) -> Option<Observer> {
        observer::observe(self, value, true)
    }

    /// Run `f` with observation of new containers switched off.
    pub fn without_observing<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = ObservingGuard {
            previous: self.inner.observing.swap(false, Ordering::SeqCst),
            flag: &self.inner.observing,
        };
        f()
    }

    pub fn set_observing(&self, observing: bool) {
        self.inner.observing.store(observing, Ordering::SeqCst);
    }

    pub fn should_observe(&self) -> bool {
        self.inner.observing.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Tracking context
    // ------------------------------------------------------------------

    /// Check if reads are currently attributed to a watcher.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    /// The watcher currently running, if any.
    pub fn current_watcher(&self) -> Option<Watcher> {
        self.inner.context.current()
    }

    /// Run `f` without recording any dependency.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _suspended = self.inner.context.enter(None);
        f()
    }

    pub fn context(&self) -> &ContextStack {
        &self.inner.context
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Start building a watcher around `getter`.
    pub fn watcher<F>(&self, getter: F) -> WatcherBuilder
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        WatcherBuilder::new(self.clone(), Arc::new(getter))
    }

    /// Create a watcher from a getter, a callback and option flags.
    pub fn create_watcher<F, C>(
        &self,
        getter: F,
        callback: C,
        options: WatchOptions,
    ) -> Result<Watcher, ReactiveError>
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
        C: Fn(&Value, &Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.watcher(getter).callback(callback).options(options).build()
    }

    /// Watch a dot-separated path (`"user.tags.0"`) below `root`.
    pub fn watch_path<C>(
        &self,
        root: &Value,
        path: &str,
        callback: C,
        options: WatchOptions,
    ) -> Result<Watcher, ReactiveError>
    where
        C: Fn(&Value, &Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        WatcherBuilder::new(self.clone(), path_getter(root, path))
            .callback(callback)
            .options(options)
            .user()
            .expression(path)
            .build()
    }

    /// Number of unowned eager watchers kept alive until their teardown.
    pub fn retained_watchers(&self) -> usize {
        self.inner.retained.len()
    }

    pub(crate) fn retain_watcher(&self, watcher: Watcher) {
        self.inner.retained.insert(watcher.id(), watcher);
    }

    pub(crate) fn release_watcher(&self, id: SubscriberId) {
        // Dropped outside the map's shard lock.
        let _released = self.inner.retained.remove(&id);
    }

    /// Create a lazily evaluated, cached value.
    pub fn computed<F>(&self, getter: F) -> Computed
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Computed::new(self.watcher(getter).build_lazy())
    }

    /// Create a root scope.
    pub fn scope(&self, name: impl Into<String>) -> Scope {
        Scope::new(self.clone(), name.into(), None)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    pub(crate) fn queue_watcher(&self, watcher: Watcher) {
        let id = watcher.id();
        let enqueued = self.inner.scheduler.lock().enqueue(watcher);
        match enqueued {
            Enqueued::Ignored => {}
            Enqueued::Added { first } => {
                tracing::trace!(watcher = %id, "queued");
                if !first {
                    return;
                }
                if self.inner.config.sync_flush {
                    if let Err(err) = self.flush() {
                        tracing::error!(error = %err, "unhandled error during flush");
                    }
                } else {
                    self.inner.flush_pending.notify_one();
                }
            }
        }
    }

    /// Run every queued watcher.
    pub fn flush(&self) -> Result<FlushSummary, ReactiveError> {
        scheduler::flush(self)
    }

    /// Number of watchers waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.scheduler.lock().pending()
    }

    /// Yield to the executor, then flush.
    pub async fn tick(&self) -> Result<FlushSummary, ReactiveError> {
        tokio::task::yield_now().await;
        self.flush()
    }

    /// Flush whenever a new batch is queued. Runs until the task is
    /// cancelled; meant to be spawned.
    pub async fn flush_loop(&self) {
        loop {
            self.inner.flush_pending.notified().await;
            tokio::task::yield_now().await;
            if let Err(err) = self.flush() {
                tracing::error!(error = %err, "unhandled error during flush");
            }
        }
    }

    /// Register a hook run after every flush.
    pub fn on_flush_complete<F: Fn() + Send + Sync + 'static>(&self, hook: F) -> FlushHookId {
        let id = FlushHookId::new();
        self.inner.flush_hooks.write().push((id, Arc::new(hook)));
        id
    }

    /// Returns `false` if the hook was not registered.
    pub fn remove_flush_hook(&self, id: FlushHookId) -> bool {
        let mut hooks = self.inner.flush_hooks.write();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    pub(crate) fn run_flush_hooks(&self) {
        let hooks: Vec<Hook> = self
            .inner
            .flush_hooks
            .read()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook();
        }
    }

    pub(crate) fn scheduler(&self) -> &Mutex<UpdateScheduler> {
        &self.inner.scheduler
    }

    // ------------------------------------------------------------------
    // Error handling
    // ------------------------------------------------------------------

    /// Install the global error handler, replacing any previous one.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&ReactiveError, Option<&Scope>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        *self.inner.error_handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_error_handler(&self) {
        *self.inner.error_handler.write() = None;
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.inner.error_handler.read().clone()
    }

    /// Route an error through the owner's ancestor hooks, then the global
    /// handler, then the log. `Err` is returned only when a non-recoverable
    /// runtime has nobody claiming the error.
    pub fn handle_error(&self, err: ReactiveError, owner: Option<&Scope>) -> Result<(), ReactiveError> {
        capture::handle_error(self, err, owner)
    }

    // ------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RuntimeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Restores the observe toggle when dropped.
struct ObservingGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for ObservingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("tracking", &self.is_tracking())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn queued_watchers_wait_for_flush() {
        let runtime = Runtime::new();
        let state = Value::object([("count", 0)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _watcher = runtime
            .watcher(move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(reader.get("count").unwrap_or_default())
            })
            .build()
            .unwrap();

        object.set("count", 1);
        object.set("count", 2);
        assert_eq!(runtime.pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let summary = runtime.flush().unwrap();
        assert_eq!(summary.ran, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.pending(), 0);
    }

    #[test]
    fn sync_flush_runs_at_once() {
        let runtime = Runtime::with_config(EngineConfig {
            sync_flush: true,
            ..EngineConfig::default()
        });
        let state = Value::object([("count", 0)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let watcher = runtime
            .watcher(move || Ok(reader.get("count").unwrap_or_default()))
            .build()
            .unwrap();

        object.set("count", 5);
        assert_eq!(runtime.pending(), 0);
        assert_eq!(watcher.value(), Value::Int(5));
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let runtime = Runtime::new();
        let state = Value::object([("a", 1), ("b", 2)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let runtime_clone = runtime.clone();

        let watcher = runtime
            .watcher(move || {
                let a = object.get("a").unwrap_or_default();
                let _b = runtime_clone.untracked(|| object.get("b"));
                Ok(a)
            })
            .build()
            .unwrap();

        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn current_watcher_is_visible_inside_the_body() {
        let runtime = Runtime::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let runtime_clone = runtime.clone();

        let watcher = runtime
            .watcher(move || {
                *seen_clone.lock() = runtime_clone.current_watcher().map(|w| w.id());
                Ok(Value::Null)
            })
            .build()
            .unwrap();

        assert_eq!(*seen.lock(), Some(watcher.id()));
        assert!(runtime.current_watcher().is_none());
    }

    #[test]
    fn flush_hooks_can_be_removed() {
        let runtime = Runtime::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let id = runtime.on_flush_complete(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        runtime.flush().unwrap();
        assert!(runtime.remove_flush_hook(id));
        assert!(!runtime.remove_flush_hook(id));
        runtime.flush().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::new();
        let second = Runtime::new();
        let state = Value::object([("n", 0)]);
        first.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let _watcher = first
            .watcher(move || Ok(reader.get("n").unwrap_or_default()))
            .build()
            .unwrap();

        object.set("n", 1);
        assert_eq!(first.pending(), 1);
        assert_eq!(second.pending(), 0);
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn set_observing_toggles_observation() {
        let runtime = Runtime::new();
        runtime.set_observing(false);
        assert!(runtime.observe(&Value::object([("a", 1)])).is_none());
        runtime.set_observing(true);
        assert!(runtime.observe(&Value::object([("a", 1)])).is_some());
    }

    #[test]
    fn observation_resumes_after_a_panic() {
        let runtime = Runtime::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            runtime.without_observing(|| panic!("factory failed"))
        }));
        assert!(result.is_err());
        assert!(runtime.should_observe());
        assert!(runtime.observe(&Value::object([("a", 1)])).is_some());
    }

    #[test]
    fn dropped_handles_keep_watching_until_teardown() {
        let runtime = Runtime::new();
        let state = Value::object([("n", 0)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let watcher = runtime
            .watcher(move || Ok(reader.get("n").unwrap_or_default()))
            .callback(move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        let id = watcher.id();
        drop(watcher);
        assert_eq!(runtime.retained_watchers(), 1);

        object.set("n", 1);
        let summary = runtime.flush().unwrap();
        assert_eq!(summary.ran, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let handle = runtime
            .inner
            .retained
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap();
        handle.teardown();
        assert_eq!(runtime.retained_watchers(), 0);

        object.set("n", 2);
        assert_eq!(runtime.pending(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reads_on_another_thread_are_not_attributed() {
        use std::sync::Barrier;

        let runtime = Runtime::new();
        let state = Value::object([("a", 1)]);
        runtime.observe(&state);
        let other_state = Value::object([("other", 2)]);
        runtime.observe(&other_state);
        let object = state.as_object().unwrap().clone();
        let other = other_state.as_object().unwrap().clone();
        let paused = Arc::new(Barrier::new(2));
        let resumed = Arc::new(Barrier::new(2));

        std::thread::scope(|s| {
            let (paused_clone, resumed_clone) = (paused.clone(), resumed.clone());
            s.spawn(move || {
                paused_clone.wait();
                let _ = other.get("other");
                resumed_clone.wait();
            });

            let watcher = runtime
                .watcher(move || {
                    let a = object.get("a").unwrap_or_default();
                    paused.wait();
                    resumed.wait();
                    Ok(a)
                })
                .build()
                .unwrap();
            assert_eq!(watcher.dependency_count(), 1);
        });
    }

    #[tokio::test]
    async fn tick_flushes_the_batch() {
        let runtime = Runtime::new();
        let state = Value::object([("n", 0)]);
        runtime.observe(&state);
        let object = state.as_object().unwrap().clone();
        let reader = object.clone();

        let watcher = runtime
            .watcher(move || Ok(reader.get("n").unwrap_or_default()))
            .build()
            .unwrap();

        object.set("n", 3);
        let summary = runtime.tick().await.unwrap();
        assert_eq!(summary.ran, 1);
        assert_eq!(watcher.value(), Value::Int(3));
    }
}
