//! Bulk processor statistics.
//!
//! Counters are cumulative for the processor's lifetime; per-worker entries
//! reflect the worker's current state.

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkProcessorStats {
    /// Number of flushes handled, summed over workers
    pub flushed: u64,
    /// Number of `_bulk` round trips that returned a response
    pub committed: u64,
    /// Number of commits that failed as a whole (batch kept for retry)
    pub commit_errors: u64,
    /// Number of `index` items in responses
    pub indexed: u64,
    /// Number of `create` items in responses
    pub created: u64,
    /// Number of `update` items in responses
    pub updated: u64,
    /// Number of `delete` items in responses
    pub deleted: u64,
    /// Number of items reported successful
    pub succeeded: u64,
    /// Number of items reported failed
    pub failed: u64,
    pub workers: Vec<WorkerStats>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    /// Requests buffered and not yet committed
    pub queued: u64,
    /// Duration of the worker's last commit attempt
    pub last_duration: Duration,
}

impl BulkProcessorStats {
    pub fn with_workers(count: usize) -> Self {
        Self {
            workers: vec![WorkerStats::default(); count],
            ..Self::default()
        }
    }

    pub fn total_queued(&self) -> u64 {
        self.workers.iter().map(|worker| worker.queued).sum()
    }

    pub(crate) fn record_item(&mut self, action: &str, success: bool) {
        match action {
            "index" => self.indexed += 1,
            "create" => self.created += 1,
            "update" => self.updated += 1,
            "delete" => self.deleted += 1,
            _ => {}
        }
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
