//! Update Scheduler
//!
//! The scheduler batches watcher re-runs. Notifications only enqueue; the
//! queue is drained by a flush.
//!
//! # Algorithm
//!
//! 1. A queued watcher is added once per batch (deduplicated by id).
//! 2. On flush the queue is sorted by watcher id. Ids follow creation order,
//!    so a parent created before its children always runs first.
//! 3. Watchers queued *during* the flush are inserted at their sorted
//!    position after the one currently running, and still run in this flush.
//! 4. Each run is counted. A watcher exceeding the configured cap within one
//!    flush is reported as a cyclic update and skipped until the next flush.
//! 5. After the queue is drained, `after_flush` hooks of the watchers that
//!    ran fire in reverse order, followed by the runtime's flush-complete
//!    hooks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ReactiveError;
use crate::reactive::{Runtime, SubscriberId, Watcher};

/// Identifies a flush-complete hook registered on a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlushHookId(u64);

impl FlushHookId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Number of watcher runs.
    pub ran: usize,
    /// Watchers skipped for exceeding the update cap, in detection order.
    pub cyclic: Vec<SubscriberId>,
}

impl FlushSummary {
    pub fn is_empty(&self) -> bool {
        self.ran == 0 && self.cyclic.is_empty()
    }
}

/// Result of queueing a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueued {
    /// Already queued, or skipped for the rest of this flush.
    Ignored,
    /// Added to the queue. `first` is set for the first watcher of a batch,
    /// which is when a flush has to be requested.
    Added { first: bool },
}

/// Batch state. Lives behind the runtime's lock; the lock is never held
/// while a watcher runs.
#[derive(Default)]
pub struct UpdateScheduler {
    queue: Vec<Watcher>,
    has: HashSet<SubscriberId>,
    runs: HashMap<SubscriberId, usize>,
    skipped: HashSet<SubscriberId>,
    index: usize,
    flushing: bool,
    waiting: bool,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued watchers not yet run.
    pub fn pending(&self) -> usize {
        if self.flushing {
            self.queue.len().saturating_sub(self.index)
        } else {
            self.queue.len()
        }
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub(crate) fn enqueue(&mut self, watcher: Watcher) -> Enqueued {
        let id = watcher.id();
        if self.skipped.contains(&id) || !self.has.insert(id) {
            return Enqueued::Ignored;
        }

        if self.flushing {
            // Keep the unprocessed tail sorted; never insert before the
            // watcher currently running.
            let mut position = self.queue.len();
            while position > self.index && self.queue[position - 1].id() > id {
                position -= 1;
            }
            self.queue.insert(position, watcher);
        } else {
            self.queue.push(watcher);
        }

        let first = !self.waiting;
        self.waiting = true;
        Enqueued::Added { first }
    }

    /// Start a flush. Returns `false` if one is already in progress.
    fn begin(&mut self) -> bool {
        if self.flushing {
            return false;
        }
        self.flushing = true;
        self.index = 0;
        self.queue.sort_by_key(Watcher::id);
        true
    }

    fn next(&mut self, max_update_count: usize) -> Option<Step> {
        let watcher = self.queue.get(self.index)?.clone();
        self.index += 1;
        let id = watcher.id();
        self.has.remove(&id);

        let runs = self.runs.entry(id).or_insert(0);
        *runs += 1;
        if *runs > max_update_count {
            let runs = *runs;
            self.skipped.insert(id);
            return Some(Step::Cyclic(watcher, runs));
        }
        Some(Step::Run(watcher))
    }

    fn reset(&mut self) -> Vec<Watcher> {
        self.index = 0;
        self.has.clear();
        self.runs.clear();
        self.skipped.clear();
        self.flushing = false;
        self.waiting = false;
        std::mem::take(&mut self.queue)
    }
}

enum Step {
    Run(Watcher),
    Cyclic(Watcher, usize),
}

/// Drain the runtime's queue.
///
/// A flush requested while one is already running returns an empty summary;
/// the running flush picks up everything queued meanwhile.
pub(crate) fn flush(runtime: &Runtime) -> Result<FlushSummary, ReactiveError> {
    if !runtime.scheduler().lock().begin() {
        return Ok(FlushSummary::default());
    }

    let max_update_count = runtime.config().max_update_count;
    let mut summary = FlushSummary::default();
    let mut surfaced = Vec::new();
    let mut ran = Vec::new();
    let mut ran_ids = HashSet::new();

    loop {
        let step = runtime.scheduler().lock().next(max_update_count);
        match step {
            None => break,
            Some(Step::Run(watcher)) => {
                if !watcher.is_active() {
                    continue;
                }
                watcher.call_before();
                if let Err(err) = watcher.run() {
                    surfaced.push(err);
                }
                summary.ran += 1;
                if ran_ids.insert(watcher.id()) {
                    ran.push(watcher);
                }
            }
            Some(Step::Cyclic(watcher, runs)) => {
                tracing::warn!(
                    watcher = %watcher.id(),
                    expression = watcher.expression(),
                    runs,
                    "you may have an infinite update loop"
                );
                summary.cyclic.push(watcher.id());
                let err = ReactiveError::CyclicUpdate {
                    watcher: watcher.id(),
                    expression: watcher.expression().to_string(),
                    runs,
                };
                if let Err(err) = runtime.handle_error(err, watcher.owner().as_ref()) {
                    surfaced.push(err);
                }
            }
        }
    }

    runtime.scheduler().lock().reset();

    for watcher in ran.iter().rev() {
        watcher.call_after_flush();
    }
    runtime.run_flush_hooks();

    tracing::debug!(ran = summary.ran, cyclic = summary.cyclic.len(), "flush complete");

    match surfaced.len() {
        0 => Ok(summary),
        1 => Err(surfaced.remove(0)),
        _ => Err(ReactiveError::Unhandled(surfaced)),
    }
}
