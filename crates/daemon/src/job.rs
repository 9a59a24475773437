//! Single-file transcode job
//!
//! A [`FileJob`] resolves paths and the output name for one input, probes its
//! duration, runs the encoder, and on success records a report row and moves
//! the original into the archive. The result is always a finalized
//! [`JobRecord`]; errors never escape past this boundary.

use crate::archive::move_to_archive;
use crate::cancel::CancellationState;
use crate::config::Config;
use crate::display::{self, TranscodeProgress};
use crate::encode::{build_encode_command, EncodeError, EncodeParams, ProcessRunner};
use crate::probe::{probe_duration, ProbeError};
use crate::report::ReportWriter;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for one job attempt
#[derive(Debug, Error)]
pub enum JobError {
    /// Duration could not be determined
    #[error("Duration probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// Encoder failed, could not start, or was aborted
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),
}

impl JobError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, JobError::Encode(EncodeError::Aborted))
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Transcode succeeded; `archived` tells whether the original was moved
    Completed { archived: bool },
    /// File-local failure; the input stays in place
    Failed(String),
    /// Torn down by a shutdown request
    Aborted,
}

/// Finalized record of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Probed duration in seconds, 0 when the probe failed
    pub total_duration_secs: f64,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub outcome: JobOutcome,
}

impl JobRecord {
    pub fn success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }

    pub fn input_file_name(&self) -> String {
        file_name_of(&self.input_path)
    }

    pub fn output_file_name(&self) -> String {
        file_name_of(&self.output_path)
    }

    /// Wall-clock seconds between start and finish
    pub fn wall_secs(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Output size as a percentage of input size, 0 for an empty input
    pub fn compression_percent(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        self.output_bytes as f64 / self.input_bytes as f64 * 100.0
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Output file name for an input, encoding the codec settings in a suffix
///
/// `My Clip.mov` with hevc_nvenc/aac/p5/QP24 and extension `mp4` becomes
/// `My_Clip_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4`.
pub fn output_file_name(input_name: &str, config: &Config) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_name.to_string());

    format!(
        "{}_[ffmpeg_{}_{}_{}_QP{}].{}",
        sanitize_filename(&stem),
        config.video_codec,
        config.audio_codec,
        config.preset_val,
        config.qp_value,
        config.op_extension.trim_start_matches('.')
    )
}

/// Size of a file in bytes, 0 when it does not exist
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Best-effort removal of a partially written output
fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed incomplete output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove incomplete output {}: {}", path.display(), e),
    }
}

/// One transcode attempt for a file in the input directory
#[derive(Debug)]
pub struct FileJob<'a> {
    config: &'a Config,
    input_name: String,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl<'a> FileJob<'a> {
    pub fn new(config: &'a Config, input_name: &str) -> Self {
        let input_path = config.input_folder.join(input_name);
        let output_path = config
            .output_folder
            .join(output_file_name(input_name, config));
        Self {
            config,
            input_name: input_name.to_string(),
            input_path,
            output_path,
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Run the job to completion and return its finalized record
    ///
    /// # Steps
    /// 1. Reset the per-job abort flag
    /// 2. Probe the input duration
    /// 3. Run the encoder with live progress
    /// 4. On failure, remove any partial output
    /// 5. On success, append a report row and move the input into the archive
    pub async fn execute(
        &self,
        runner: &ProcessRunner,
        cancel: &CancellationState,
        report: &mut ReportWriter,
    ) -> JobRecord {
        cancel.begin_job();
        let started_at = Local::now();
        info!("Processing {}", self.input_name);

        let mut record = JobRecord {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            total_duration_secs: 0.0,
            started_at,
            finished_at: started_at,
            input_bytes: 0,
            output_bytes: 0,
            outcome: JobOutcome::Aborted,
        };

        let duration = match probe_duration(&self.config.probe_bin, &self.input_path).await {
            Ok(duration) => duration,
            Err(e) => {
                let e = JobError::from(e);
                error!("Compression failed for {}: {}", self.input_name, e);
                display::print_line(&format!("Skipping {}: {}", self.input_name, e));
                record.finished_at = Local::now();
                record.input_bytes = file_size(&self.input_path);
                record.outcome = JobOutcome::Failed(e.to_string());
                return record;
            }
        };
        record.total_duration_secs = duration;

        if let Err(e) = self.transcode(runner, cancel, duration).await {
            record.finished_at = Local::now();
            record.input_bytes = file_size(&self.input_path);
            if e.is_aborted() {
                info!("Aborted {} on shutdown request", self.input_name);
                record.outcome = JobOutcome::Aborted;
            } else {
                error!("Compression failed for {}: {}", self.input_name, e);
                display::print_line(&format!("\n{}", e));
                record.outcome = JobOutcome::Failed(e.to_string());
            }
            display::print_line("Cleaning up incomplete output file...");
            remove_partial_output(&self.output_path);
            return record;
        }

        record.finished_at = Local::now();
        record.input_bytes = file_size(&self.input_path);
        record.output_bytes = file_size(&self.output_path);
        record.outcome = JobOutcome::Completed { archived: false };

        // Only a fully recorded job may leave the input directory.
        if let Err(e) = report.append(&record) {
            error!(
                "Failed to write report row for {}; leaving it in place: {}",
                self.input_name, e
            );
            return record;
        }

        let archived = match move_to_archive(&self.input_path, &self.config.archive_folder) {
            Ok(dest) => {
                info!("Moved {} to archive ({})", self.input_name, dest.display());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to archive {}: {} (it will be picked up again by the next scan)",
                    self.input_name, e
                );
                false
            }
        };
        record.outcome = JobOutcome::Completed { archived };
        record
    }

    async fn transcode(
        &self,
        runner: &ProcessRunner,
        cancel: &CancellationState,
        duration: f64,
    ) -> Result<(), JobError> {
        let params = EncodeParams::from_config(
            self.config,
            self.input_path.clone(),
            self.output_path.clone(),
        );
        let command = build_encode_command(&params);

        let progress = TranscodeProgress::new();
        let result = runner
            .run(command, duration, cancel, |sample| progress.update(sample))
            .await;

        match result {
            Ok(()) => {
                progress.finish();
                Ok(())
            }
            Err(e) => {
                progress.abandon();
                if matches!(e, EncodeError::Aborted) {
                    display::print_line("Aborted! Killing encoder process...");
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_config() -> Config {
        Config {
            qp_value: 24,
            video_codec: "hevc_nvenc".to_string(),
            audio_codec: "aac".to_string(),
            preset_val: "p5".to_string(),
            op_extension: "mp4".to_string(),
            input_folder: PathBuf::from("input"),
            output_folder: PathBuf::from("output"),
            archive_folder: PathBuf::from("archive"),
            log_file: PathBuf::from("compressor.log"),
            csv_filename_pattern: "report_%Y%m%d.csv".to_string(),
            video_extensions: vec![".mp4".to_string()],
            retry_wait_seconds: 1,
            encoder_bin: "ffmpeg".to_string(),
            probe_bin: "ffprobe".to_string(),
        }
    }

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize_filename("My Clip (final)"), "My_Clip__final_");
        assert_eq!(sanitize_filename("a-b_c.d"), "a-b_c.d");
        assert_eq!(sanitize_filename("ünïcode"), "_n_code");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_output_file_name() {
        let config = test_config();
        assert_eq!(
            output_file_name("My Clip.mov", &config),
            "My_Clip_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4"
        );
        assert_eq!(
            output_file_name("show.s01e01.mkv", &config),
            "show.s01e01_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4"
        );
    }

    #[test]
    fn test_output_extension_leading_dot_is_tolerated() {
        let mut config = test_config();
        config.op_extension = ".mkv".to_string();
        assert!(output_file_name("a.mp4", &config).ends_with("QP24].mkv"));
    }

    #[test]
    fn test_file_job_paths() {
        let config = test_config();
        let job = FileJob::new(&config, "clip 1.mp4");
        assert_eq!(job.input_path(), Path::new("input/clip 1.mp4"));
        assert_eq!(
            job.output_path(),
            Path::new("output/clip_1_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4")
        );
    }

    #[test]
    fn test_record_helpers() {
        let now = Local::now();
        let record = JobRecord {
            input_path: PathBuf::from("input/a.mp4"),
            output_path: PathBuf::from("output/b.mp4"),
            total_duration_secs: 10.0,
            started_at: now,
            finished_at: now,
            input_bytes: 0,
            output_bytes: 10,
            outcome: JobOutcome::Completed { archived: false },
        };
        assert!(record.success());
        assert_eq!(record.compression_percent(), 0.0);
        assert_eq!(record.wall_secs(), 0.0);
        assert_eq!(record.input_file_name(), "a.mp4");
        assert_eq!(record.output_file_name(), "b.mp4");
    }

    #[test]
    fn test_file_size_missing_is_zero() {
        assert_eq!(file_size(Path::new("/nonexistent/file.mp4")), 0);
    }

    // Property: sanitized names only contain [A-Za-z0-9._-], keep their length in
    // characters, and sanitizing is idempotent.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_sanitize_charset_and_idempotence(name in "\\PC{0,40}") {
            let once = sanitize_filename(&name);
            prop_assert!(
                once.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "unexpected character in {:?}",
                once
            );
            prop_assert_eq!(once.chars().count(), name.chars().count());
            prop_assert_eq!(sanitize_filename(&once), once);
        }
    }
}
