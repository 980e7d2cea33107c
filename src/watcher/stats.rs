//! Counters for index synchronization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What happened to one path in an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Node merged with fresh tags.
    Indexed,
    /// Stored row already as new as the file.
    Skipped,
    /// Extension not on the allow list.
    Filtered,
}

/// Lifetime totals of the synchronizer.
#[derive(Debug, Default)]
pub struct SyncStats {
    pub upserted: AtomicU64,
    pub skipped: AtomicU64,
    pub filtered: AtomicU64,
    pub deleted: AtomicU64,
    pub errors: AtomicU64,
}

impl SyncStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a finished batch to the totals.
    pub fn record(&self, report: &BatchReport) {
        self.upserted.fetch_add(report.upserted, Ordering::Relaxed);
        self.skipped.fetch_add(report.skipped, Ordering::Relaxed);
        self.filtered.fetch_add(report.filtered, Ordering::Relaxed);
        self.deleted.fetch_add(report.deleted, Ordering::Relaxed);
        self.errors.fetch_add(report.errors, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> BatchReport {
        BatchReport {
            upserted: self.upserted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Counts for one batch, or a snapshot of the totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub upserted: u64,
    pub skipped: u64,
    pub filtered: u64,
    pub deleted: u64,
    pub errors: u64,
}

impl BatchReport {
    /// Count one upsert outcome.
    pub fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Indexed => self.upserted += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
            UpsertOutcome::Filtered => self.filtered += 1,
        }
    }

    /// Total paths looked at.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.upserted + self.skipped + self.filtered + self.deleted + self.errors
    }
}
