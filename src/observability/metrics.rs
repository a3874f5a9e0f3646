//! Store counters
//!
//! - Counters only, monotonic
//! - Reset only when the store is created
//! - Atomic so a shared handle can be read from another thread

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one store instance
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Rows merged into an output record
    rows_read: AtomicU64,
    /// Rows dropped because they were behind the watermark
    rows_skipped: AtomicU64,
    /// Merged records produced
    records_merged: AtomicU64,
    /// Data rows appended
    rows_written: AtomicU64,
    /// Header lines written
    headers_written: AtomicU64,
    /// `save` calls that returned an error
    save_failures: AtomicU64,
}

impl StoreMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one row merged into the accumulator
    pub fn increment_rows_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one stale row dropped
    pub fn increment_rows_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one merged record handed out
    pub fn increment_records_merged(&self) {
        self.records_merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one appended data row
    pub fn increment_rows_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one header line
    pub fn increment_headers_written(&self) {
        self.headers_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed `save`
    pub fn increment_save_failures(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            records_merged: self.records_merged.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            headers_written: self.headers_written.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"rows_read":{},"rows_skipped":{},"records_merged":{},"rows_written":{},"headers_written":{},"save_failures":{}}}"#,
            s.rows_read, s.rows_skipped, s.records_merged, s.rows_written, s.headers_written, s.save_failures,
        )
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub records_merged: u64,
    pub rows_written: u64,
    pub headers_written: u64,
    pub save_failures: u64,
}
