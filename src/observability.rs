//! Pipeline counters surfaced through the status endpoint

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    ticks_started: AtomicU64,
    ticks_skipped: AtomicU64,
    ticks_failed: AtomicU64,
    batches_dispatched: AtomicU64,
    requests_dispatched: AtomicU64,
    requests_quarantined: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_started(&self) {
        self.ticks_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_started", "Metric incremented");
    }

    /// Lock held by another instance
    pub fn tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_skipped", "Metric incremented");
    }

    pub fn tick_failed(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_failed", "Metric incremented");
    }

    pub fn batch_dispatched(&self, requests: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.requests_dispatched
            .fetch_add(requests as u64, Ordering::Relaxed);
        tracing::debug!(counter = "batches_dispatched", requests, "Metric incremented");
    }

    pub fn request_quarantined(&self) {
        self.requests_quarantined.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_quarantined", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_started: self.ticks_started.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            requests_quarantined: self.requests_quarantined.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_started: u64,
    pub ticks_skipped: u64,
    pub ticks_failed: u64,
    pub batches_dispatched: u64,
    pub requests_dispatched: u64,
    pub requests_quarantined: u64,
}
