use std::sync::atomic::{AtomicU64, Ordering};

/// Hook invocation counters. Reads are relaxed and only meant for display.
#[derive(Debug, Default)]
pub struct CallCounters {
    before: AtomicU64,
    after: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCountersSnapshot {
    pub before_calls: u64,
    pub after_calls: u64,
    pub success_calls: u64,
    pub failure_calls: u64,
}

impl CallCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_before(&self) {
        self.before.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_after(&self, success: bool) {
        self.after.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CallCountersSnapshot {
        CallCountersSnapshot {
            before_calls: self.before.load(Ordering::Relaxed),
            after_calls: self.after.load(Ordering::Relaxed),
            success_calls: self.success.load(Ordering::Relaxed),
            failure_calls: self.failure.load(Ordering::Relaxed),
        }
    }
}
