//! Cumulative batch statistics

use crate::job::JobRecord;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert a byte count to megabytes (MiB) for reporting
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Running totals across every successfully completed job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub file_count: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finalized record into the totals
    ///
    /// Records that did not succeed are ignored.
    pub fn record(&mut self, record: &JobRecord) {
        if !record.success() {
            return;
        }
        self.file_count += 1;
        self.input_bytes += record.input_bytes;
        self.output_bytes += record.output_bytes;
    }

    /// Bytes saved so far; negative when outputs outgrew their inputs
    pub fn space_saved_bytes(&self) -> i128 {
        self.input_bytes as i128 - self.output_bytes as i128
    }

    /// Saved space as a percentage of total input, 0 when nothing was processed
    pub fn saved_percent(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        self.space_saved_bytes() as f64 / self.input_bytes as f64 * 100.0
    }

    pub fn input_mb(&self) -> f64 {
        bytes_to_mb(self.input_bytes)
    }

    pub fn output_mb(&self) -> f64 {
        bytes_to_mb(self.output_bytes)
    }

    pub fn saved_mb(&self) -> f64 {
        self.input_mb() - self.output_mb()
    }

    /// One-line summary written to the log on shutdown
    pub fn summary_line(&self) -> String {
        format!(
            "Summary: Files={}, Input={:.2} MB, Output={:.2} MB, Saved={:.2} MB ({:.2}%)",
            self.file_count,
            self.input_mb(),
            self.output_mb(),
            self.saved_mb(),
            self.saved_percent()
        )
    }
}
