//! Reactive Primitives
//!
//! This module implements the core reactive system: observed data, watchers,
//! computed values and scopes. These primitives form the foundation of
//! Trellis's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Observed data
//!
//! Objects and arrays become reactive when a [`Runtime`] observes them. Every
//! property gets its own dependency set; reading the property while a watcher
//! runs subscribes that watcher, and writing a different value notifies it.
//! Arrays notify through their mutating methods.
//!
//! ## Watchers
//!
//! A [`Watcher`] runs a body, records what it read, and re-runs when any of it
//! changes, optionally calling back with the new and old value. Re-runs are
//! batched by the runtime's scheduler.
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazy watcher: it caches its value and only recomputes
//! when read after a dependency changed.
//!
//! ## Scopes
//!
//! A [`Scope`] owns watchers and root state, and gives errors raised below it
//! a chain of handlers to pass through before reaching the runtime.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: the runtime keeps a stack of running
//! watchers, and a reactive read registers the dependency with the watcher on
//! top of the stack. This approach (sometimes called "transparent
//! reactivity") is used by Vue, SolidJS and Leptos.

mod array;
mod capture;
mod computed;
mod context;
mod observer;
pub(crate) mod runtime;
mod scope;
mod subscriber;
mod value;
pub(crate) mod watcher;

pub use array::ReactiveArray;
pub use capture::{capture_chain, Capture, ErrorCapturedHook, ErrorHandler};
pub use computed::{Computed, ComputedState};
pub use context::{ContextGuard, ContextStack};
pub use observer::{delete, set, Key, Observer};
pub use runtime::Runtime;
pub use scope::{Scope, WeakScope};
pub use subscriber::SubscriberId;
pub use value::{ReactiveObject, Value};
pub use watcher::{Callback, Getter, Hook, WatchOptions, Watcher, WatcherBuilder};
