//! Relay counters.
//!
//! Shared between the detector and the processor threads; every counter is
//! a relaxed atomic, read back through [`RelayStats::snapshot`].

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Thread-safe counters for one relay run.
#[derive(Debug, Default)]
pub struct RelayStats {
    scans: AtomicUsize,
    listing_failures: AtomicUsize,
    created: AtomicUsize,
    modified: AtomicUsize,
    evictions: AtomicUsize,
    processed: AtomicUsize,
    delivered: AtomicUsize,
    rejected: AtomicUsize,
    parse_failures: AtomicUsize,
    submit_failures: AtomicUsize,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub scans: usize,
    pub listing_failures: usize,
    pub created: usize,
    pub modified: usize,
    pub evictions: usize,
    pub processed: usize,
    pub delivered: usize,
    pub rejected: usize,
    pub parse_failures: usize,
    pub submit_failures: usize,
}

impl StatsSnapshot {
    /// Events handed to the processors.
    pub fn events(&self) -> usize {
        self.created + self.modified
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scan(&self) {
        bump(&self.scans);
    }

    pub fn record_listing_failure(&self) {
        bump(&self.listing_failures);
    }

    pub fn record_created(&self) {
        bump(&self.created);
    }

    pub fn record_modified(&self) {
        bump(&self.modified);
    }

    pub fn record_eviction(&self) {
        bump(&self.evictions);
    }

    pub fn record_processed(&self) {
        bump(&self.processed);
    }

    pub fn record_delivered(&self) {
        bump(&self.delivered);
    }

    pub fn record_rejected(&self) {
        bump(&self.rejected);
    }

    pub fn record_parse_failure(&self) {
        bump(&self.parse_failures);
    }

    pub fn record_submit_failure(&self) {
        bump(&self.submit_failures);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            scans: self.scans.load(Ordering::Relaxed),
            listing_failures: self.listing_failures.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
        }
    }
}
