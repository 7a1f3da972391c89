//! Trellis Core
//!
//! This crate provides a fine-grained reactive engine: plain data is made
//! observable, computations record what they read, and exactly the affected
//! computations re-run when that data changes. It implements:
//!
//! - Observed objects and arrays with per-property dependency tracking
//! - Watchers (eager, sync and lazy) with dependency diffing between runs
//! - A batching update scheduler with deduplication and cycle detection
//! - Error containment through scopes and a global handler
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Observed values, watchers, computed values, scopes and the
//!   runtime that ties them together
//! - `graph`: Dependency sets and the update scheduler
//! - `config`: Engine configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let state = Value::object([("count", 0)]);
//! runtime.observe(&state);
//! let counter = state.as_object().unwrap().clone();
//!
//! // Derived value, recomputed on demand
//! let reader = counter.clone();
//! let doubled = runtime.computed(move || {
//!     let count = reader.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(Value::Int(count * 2))
//! });
//!
//! // Watcher with a callback
//! let reader = counter.clone();
//! let _watcher = runtime
//!     .watcher(move || Ok(reader.get("count").unwrap_or_default()))
//!     .callback(|new, old| {
//!         println!("count: {old:?} -> {new:?}");
//!         Ok(())
//!     })
//!     .build()?;
//!
//! counter.set("count", 5);
//! runtime.flush()?; // prints "count: Int(0) -> Int(5)"
//! assert_eq!(doubled.get()?, Value::Int(10));
//! # Ok::<(), trellis_core::error::ReactiveError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::EngineConfig;
pub use error::{BoxError, ReactiveError};
pub use reactive::{Runtime, Value};
