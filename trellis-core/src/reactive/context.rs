//! Reactive Context
//!
//! The context stack tracks which watcher is currently running, so that a
//! property read can be attributed to it.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context, which keeps a separate
//! stack per thread. A read is only attributed to a watcher running on the
//! same thread, so a runtime shared with a spawned flush loop or worker
//! threads never mixes up their dependencies.
//!
//! Running a watcher pushes it; the returned [`ContextGuard`] pops it again
//! when dropped, so the stack is restored on every exit path, including early
//! returns with `?` and panics.
//!
//! An entry may also be empty: pushing `None` suspends tracking for the
//! duration of the guard (untracked reads, error handling, data factories).
//! Nested runs (a watcher evaluating a lazy computed value) simply push on
//! top of the current entry.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use super::watcher::Watcher;
use super::SubscriberId;

/// Per-thread stacks of running watchers for one engine instance.
#[derive(Default)]
pub struct ContextStack {
    stacks: DashMap<ThreadId, Vec<Option<Watcher>>>,
}

/// Guard that pops the context when dropped.
///
/// The guard belongs to the thread that created it.
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ContextGuard<'a> {
    owner: &'a ContextStack,
    thread: ThreadId,
    subscriber_id: Option<SubscriberId>,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl ContextStack {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a watcher (or `None` to suspend tracking) as the current context
    /// of the calling thread.
    pub fn enter(&self, watcher: Option<Watcher>) -> ContextGuard<'_> {
        let thread = thread::current().id();
        let subscriber_id = watcher.as_ref().map(Watcher::id);
        let mut stack = self.stacks.entry(thread).or_default();
        stack.push(watcher);
        let depth = stack.len();
        ContextGuard {
            owner: self,
            thread,
            subscriber_id,
            depth,
            _not_send: PhantomData,
        }
    }

    fn with_stack<R>(&self, f: impl FnOnce(&[Option<Watcher>]) -> R) -> R {
        match self.stacks.get(&thread::current().id()) {
            Some(stack) => f(&stack),
            None => f(&[]),
        }
    }

    /// The watcher reads on this thread are currently attributed to, if any.
    pub fn current(&self) -> Option<Watcher> {
        self.with_stack(|stack| stack.last().cloned().flatten())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.with_stack(|stack| stack.last().and_then(|entry| entry.as_ref().map(Watcher::id)))
    }

    /// Check if reads on this thread are currently being tracked.
    pub fn is_active(&self) -> bool {
        self.with_stack(|stack| matches!(stack.last(), Some(Some(_))))
    }

    /// Number of entries on this thread's stack, suspended entries included.
    pub fn depth(&self) -> usize {
        self.with_stack(<[_]>::len)
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = {
            let Some(mut stack) = self.owner.stacks.get_mut(&self.thread) else {
                return;
            };
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "context guards dropped out of order"
            );
            stack.pop()
        };
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.as_ref().map(Watcher::id),
                self.subscriber_id,
                "context stack mismatch: expected {:?}",
                self.subscriber_id,
            );
        }
        self.owner
            .stacks
            .remove_if(&self.thread, |_, stack| stack.is_empty());
    }
}
