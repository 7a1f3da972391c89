//! Scopes
//!
//! A [`Scope`] is a reactive owner, such as a component instance. It groups
//! the watchers created for it (torn down together by
//! [`destroy`](Scope::destroy)), holds its root state, and carries
//! error-capture hooks that see errors raised by watchers of its descendants.
//!
//! Scopes hold their watchers; watchers only hold a weak link back to their
//! owner.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::capture::{Capture, ErrorCapturedHook};
use super::computed::Computed;
use super::runtime::Runtime;
use super::subscriber::SubscriberId;
use super::value::{ReactiveObject, Value};
use super::watcher::{Watcher, WatcherBuilder};
use crate::error::{BoxError, ReactiveError};

/// A reactive owner.
///
/// Cloning a `Scope` creates a new handle to the same owner.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// Non-owning link to a [`Scope`].
#[derive(Clone)]
pub struct WeakScope(Weak<ScopeInner>);

struct ScopeInner {
    name: String,
    runtime: Runtime,
    parent: Option<Scope>,
    error_captured: RwLock<Vec<ErrorCapturedHook>>,
    watchers: Mutex<Vec<Watcher>>,
    data: RwLock<Option<Value>>,
    destroyed: AtomicBool,
}

impl Scope {
    pub(crate) fn new(runtime: Runtime, name: String, parent: Option<Scope>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name,
                runtime,
                parent,
                error_captured: RwLock::new(Vec::new()),
                watchers: Mutex::new(Vec::new()),
                data: RwLock::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a child scope.
    pub fn child(&self, name: impl Into<String>) -> Scope {
        Scope::new(self.inner.runtime.clone(), name.into(), Some(self.clone()))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Scope> + '_ {
        std::iter::successors(self.parent().cloned(), |scope| scope.parent().cloned())
    }

    /// Register a hook that sees errors raised below this scope.
    pub fn on_error_captured<F>(&self, hook: F)
    where
        F: Fn(&ReactiveError, &Scope) -> Result<Capture, BoxError> + Send + Sync + 'static,
    {
        self.inner.error_captured.write().push(Arc::new(hook));
    }

    pub(crate) fn error_captured_hooks(&self) -> Vec<ErrorCapturedHook> {
        self.inner.error_captured.read().clone()
    }

    /// Start building a watcher owned by this scope.
    pub fn watcher<F>(&self, getter: F) -> WatcherBuilder
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.inner.runtime.watcher(getter).owner(self)
    }

    /// Create a computed value owned by this scope.
    pub fn computed<F>(&self, getter: F) -> Computed
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Computed::new(self.watcher(getter).build_lazy())
    }

    /// Produce and observe the scope's root state.
    ///
    /// The factory runs with tracking suspended. A failing factory is
    /// reported through error handling and an empty object is used instead;
    /// so is a factory returning anything but an object.
    pub fn init_data<F>(&self, factory: F) -> Result<Value, ReactiveError>
    where
        F: FnOnce() -> Result<Value, BoxError>,
    {
        let runtime = &self.inner.runtime;
        let data = match runtime.untracked(factory) {
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => {
                tracing::warn!(scope = self.name(), value = ?other, "data functions should return an object");
                Value::Object(ReactiveObject::new())
            }
            Err(source) => {
                let err = ReactiveError::Evaluation {
                    info: "data()".to_string(),
                    source,
                };
                runtime.handle_error(err, Some(self))?;
                Value::Object(ReactiveObject::new())
            }
        };

        runtime.observe_root(&data);
        if let Some(previous) = self.inner.data.write().replace(data.clone()) {
            if let Some(observer) = previous.observer() {
                observer.release_root();
            }
        }
        Ok(data)
    }

    /// The root state, once initialized.
    pub fn data(&self) -> Option<Value> {
        self.inner.data.read().clone()
    }

    /// Tear down every watcher owned by the scope. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let watchers = std::mem::take(&mut *self.inner.watchers.lock());
        for watcher in &watchers {
            watcher.teardown();
        }
        if let Some(observer) = self.data().as_ref().and_then(Value::observer) {
            observer.release_root();
        }
        tracing::debug!(scope = self.name(), watchers = watchers.len(), "scope destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of live watchers owned by the scope.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    pub(crate) fn adopt(&self, watcher: Watcher) {
        if self.is_destroyed() {
            tracing::warn!(scope = self.name(), "watcher created on a destroyed scope");
        }
        self.inner.watchers.lock().push(watcher);
    }

    pub(crate) fn forget(&self, id: SubscriberId) {
        self.inner.watchers.lock().retain(|watcher| watcher.id() != id);
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("parent", &self.parent().map(Scope::name))
            .field("watchers", &self.watcher_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
