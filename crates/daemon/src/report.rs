//! Per-run CSV report
//!
//! One file per run, named from a strftime pattern. Each completed job adds a
//! row and the file is flushed immediately so an interrupted run keeps every
//! row written so far.

use crate::job::JobRecord;
use crate::stats::bytes_to_mb;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column headers, in order
pub const REPORT_HEADER: [&str; 8] = [
    "Input File",
    "Output File",
    "Input Size (MB)",
    "Output Size (MB)",
    "Compression %",
    "Duration (s)",
    "Start Time",
    "End Time",
];

const TIME_FORMAT: &str = "%H:%M:%S";

/// Error type for report operations
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write report row: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid report filename pattern: {0}")]
    InvalidPattern(String),
}

/// Expand a strftime pattern into a report file name
pub fn report_file_name(pattern: &str, now: &DateTime<Local>) -> Result<String, ReportError> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ReportError::InvalidPattern(pattern.to_string()));
    }
    Ok(now.format(pattern).to_string())
}

/// Render the CSV fields for one completed job
pub fn report_row(record: &JobRecord) -> [String; 8] {
    [
        record.input_file_name(),
        record.output_file_name(),
        format!("{:.2}", bytes_to_mb(record.input_bytes)),
        format!("{:.2}", bytes_to_mb(record.output_bytes)),
        format!("{:.2}", record.compression_percent()),
        format!("{:.2}", record.wall_secs()),
        record.started_at.format(TIME_FORMAT).to_string(),
        record.finished_at.format(TIME_FORMAT).to_string(),
    ]
}

/// Append-only CSV writer for the current run
pub struct ReportWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ReportWriter {
    /// Create the report at `path` and write the header row
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(REPORT_HEADER)?;
        writer.flush()?;
        Ok(Self { path, writer })
    }

    /// Create a report named by expanding `pattern` with the current local time
    pub fn create_from_pattern(pattern: &str) -> Result<Self, ReportError> {
        let name = report_file_name(pattern, &Local::now())?;
        Self::create(name)
    }

    /// Append one row for a completed job and flush it to disk
    pub fn append(&mut self, record: &JobRecord) -> Result<(), ReportError> {
        self.writer.write_record(report_row(record))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
