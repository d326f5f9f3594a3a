//! Per-queue delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the queue as messages move through it.
#[derive(Debug, Default)]
pub struct QueueStats {
    received: AtomicU64,
    sent: AtomicU64,
    deliveries: AtomicU64,
    acknowledged: AtomicU64,
    negative_acknowledged: AtomicU64,
    timed_out: AtomicU64,
    acknowledge_timed_out: AtomicU64,
    removed: AtomicU64,
    saved: AtomicU64,
    errors: AtomicU64,
}

/// Serializable snapshot of [`QueueStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    pub received: u64,
    pub sent: u64,
    pub deliveries: u64,
    pub acknowledged: u64,
    pub negative_acknowledged: u64,
    pub timed_out: u64,
    pub acknowledge_timed_out: u64,
    pub removed: u64,
    pub saved: u64,
    pub errors: u64,
}

impl QueueStats {
    pub(crate) fn add_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_negative_acknowledged(&self) {
        self.negative_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_acknowledge_timed_out(&self) {
        self.acknowledge_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_saved(&self) {
        self.saved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            negative_acknowledged: self.negative_acknowledged.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            acknowledge_timed_out: self.acknowledge_timed_out.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
