//! Batch metrics aggregation
//!
//! Written concurrently by task runners, read once after the executor has
//! drained.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;

/// Shared per-batch counters and per-image durations
#[derive(Debug, Default)]
pub struct BatchMetrics {
    durations: DashMap<String, Duration>,
    total_files: AtomicU64,
    reported: AtomicUsize,
    clean: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers are unique within a batch, so a later record replaces an earlier one
    pub fn record_duration(&self, identifier: &str, duration: Duration) {
        self.durations.insert(identifier.to_string(), duration);
    }

    pub fn add_files(&self, count: u64) {
        self.total_files.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mark_reported(&self) {
        self.reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_clean(&self) {
        self.clean.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Snapshot sorted by identifier
    pub fn summary(&self, elapsed: Duration) -> BatchSummary {
        let mut durations: Vec<(String, Duration)> = self
            .durations
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        durations.sort_by(|a, b| a.0.cmp(&b.0));

        BatchSummary {
            durations,
            elapsed,
            total_files: self.total_files(),
            reported: self.reported.load(Ordering::Relaxed),
            clean: self.clean.load(Ordering::Relaxed),
            failed: self.failed_count(),
        }
    }
}

/// Final report of a completed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub durations: Vec<(String, Duration)>,
    pub elapsed: Duration,
    pub total_files: u64,
    pub reported: usize,
    pub clean: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Duration table followed by the grand total line
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .durations
            .iter()
            .map(|(identifier, duration)| format!("{}\t{:?}", identifier, duration))
            .collect();
        lines.push(format!(
            "all completed in {:?}; total files scanned: {}",
            self.elapsed, self.total_files
        ));
        lines
    }

    pub fn processed(&self) -> usize {
        self.reported + self.clean + self.failed
    }
}
