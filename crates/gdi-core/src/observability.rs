use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of [`DispatchCounters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCounts {
    pub submitted: u64,
    pub completed: u64,
    pub mismatches: u64,
    pub retries: u64,
}

/// Running counters of one dispatch strategy.
#[derive(Debug, Default)]
pub struct DispatchCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    mismatches: AtomicU64,
    retries: AtomicU64,
}

impl DispatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mismatch(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchCounts {
        DispatchCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
