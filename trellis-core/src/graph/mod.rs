//! Dependency Graph
//!
//! This module implements the edges between observed data and the watchers
//! that read it, and the scheduler that re-runs watchers when those edges
//! fire.
//!
//! # Overview
//!
//! The graph is bipartite and distributed:
//!
//! - A [`Dep`] sits next to every observable slot and holds its subscribers
//! - A watcher holds the `Dep`s it read during its last run
//!
//! When a slot changes, its `Dep` notifies each subscriber, which either
//! marks itself dirty, re-runs, or enqueues itself on the
//! [`UpdateScheduler`].
//!
//! # Design Decisions
//!
//! 1. Edges are stored on both sides so a watcher can drop stale
//!    subscriptions after each run without a global index.
//!
//! 2. Subscribers are held weakly by their dependency sets; a watcher lives
//!    until teardown through its scope, or through the runtime when unowned.
//!
//! 3. Notification and flush both run in watcher id order, which is creation
//!    order, so parents always run before their children.

mod dep;
pub(crate) mod scheduler;

pub use dep::{Dep, DepId};
pub use scheduler::{FlushHookId, FlushSummary, UpdateScheduler};
