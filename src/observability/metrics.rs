//! Page store counters
//!
//! - Counters only, monotonic
//! - Reset only when the resource is opened
//! - Relaxed atomics; values are exact once writers are quiescent

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct StoreMetrics {
    commits: AtomicU64,
    commit_failures: AtomicU64,
    aborts: AtomicU64,
    pages_flushed: AtomicU64,
    bytes_flushed: AtomicU64,
    overflow_pages: AtomicU64,
    pages_read: AtomicU64,
    read_trx_opened: AtomicU64,
    labels_assigned: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aborts(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// One flushed page of `bytes` serialized bytes
    pub fn record_flush(&self, bytes: u64) {
        self.pages_flushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_overflow_pages(&self) {
        self.overflow_pages.fetch_add(1, Ordering::Relaxed);
    }

    /// Page read from storage (cache misses only)
    pub fn increment_pages_read(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_read_trx(&self) {
        self.read_trx_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_labels_assigned(&self, count: u64) {
        self.labels_assigned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            pages_flushed: self.pages_flushed.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            overflow_pages: self.overflow_pages.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            read_trx_opened: self.read_trx_opened.load(Ordering::Relaxed),
            labels_assigned: self.labels_assigned.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub commit_failures: u64,
    pub aborts: u64,
    pub pages_flushed: u64,
    pub bytes_flushed: u64,
    pub overflow_pages: u64,
    pub pages_read: u64,
    pub read_trx_opened: u64,
    pub labels_assigned: u64,
}
