//! Engine Configuration
//!
//! Runtime knobs for a [`Runtime`](crate::reactive::Runtime). Every field has a
//! default, so a partial JSON document is a valid configuration.

use serde::Deserialize;

use crate::error::ReactiveError;

/// Default number of times one watcher may run within a single flush before
/// it is treated as an infinite update loop.
pub const DEFAULT_MAX_UPDATE_COUNT: usize = 100;

/// Configuration for a reactive engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Runs allowed per watcher per flush before a cyclic update is reported.
    pub max_update_count: usize,

    /// When `false`, errors that no scope hook or global handler claims are
    /// surfaced to the caller (of `flush`, `evaluate`, ...) instead of only
    /// being logged.
    pub recoverable: bool,

    /// Flush the scheduler queue as soon as a watcher is queued instead of
    /// waiting for the next explicit flush or tick.
    pub sync_flush: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
            recoverable: true,
            sync_flush: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ReactiveError> {
        Ok(serde_json::from_str(json)?)
    }
}
