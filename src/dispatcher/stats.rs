/// Dispatcher counters
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatcherStats {
    submitted: AtomicU64,
    deferred: AtomicU64,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub submitted: u64,
    /// Requests that had to wait for a later window
    pub deferred: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub not_found: u64,
    pub failed: u64,
    pub pending: usize,
}

impl DispatcherStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pending,
        }
    }
}
