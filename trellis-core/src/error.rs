//! Error Types
//!
//! Every failure the engine reports is a [`ReactiveError`]. User code (watcher
//! bodies, callbacks, hooks) returns [`BoxError`], which the engine wraps with
//! enough context to locate the failing computation.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Error type returned by user-supplied bodies, callbacks and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the reactive engine.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A watcher body (getter) failed.
    #[error("error in {info}: {source}")]
    Evaluation {
        /// Where the failure happened, e.g. `getter for watcher "count"`.
        info: String,
        #[source]
        source: BoxError,
    },

    /// A callback fired after a watcher re-ran failed.
    #[error("error in {info}: {source}")]
    Callback {
        info: String,
        #[source]
        source: BoxError,
    },

    /// An error-capture hook registered on a scope failed while handling
    /// another error.
    #[error("error in error-capture hook of scope \"{scope}\": {source}")]
    CaptureHook {
        scope: String,
        #[source]
        source: BoxError,
    },

    /// A watcher kept re-queueing itself within a single flush.
    #[error(
        "possible infinite update loop in watcher {watcher} (\"{expression}\"): ran {runs} times in one flush"
    )]
    CyclicUpdate {
        watcher: SubscriberId,
        expression: String,
        runs: usize,
    },

    /// Several errors surfaced from one flush.
    #[error("{} unhandled errors during flush, first: {}", .0.len(), .0[0])]
    Unhandled(Vec<ReactiveError>),

    /// The engine configuration could not be parsed.
    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Short description of where the error happened, without the cause.
    pub fn info(&self) -> &str {
        match self {
            Self::Evaluation { info, .. } | Self::Callback { info, .. } => info,
            Self::CaptureHook { .. } => "error-capture hook",
            Self::CyclicUpdate { .. } => "scheduler flush",
            Self::Unhandled(_) => "scheduler flush",
            Self::Config(_) => "engine config",
        }
    }
}
