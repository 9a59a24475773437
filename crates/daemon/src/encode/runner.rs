//! Encoder process runner
//!
//! Launches the encoder with progress streaming on stdout, turns each time
//! update into a [`ProgressSample`], and tears the process down when a
//! shutdown is requested. The child is always reaped before `run` returns.

use crate::cancel::CancellationState;
use crate::progress::{ProgressParser, ProgressSample};
use log::{debug, info, warn};
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Encoder could not be launched
    #[error("Failed to launch encoder: {0}")]
    Spawn(std::io::Error),

    /// Encoder stdout was not captured
    #[error("Encoder progress stream unavailable")]
    NoProgressStream,

    /// Encoder process exited with non-zero status
    #[error("Encoder failed with exit code: {0}")]
    EncoderFailed(i32),

    /// Encoder process was terminated by signal
    #[error("Encoder process was terminated by signal")]
    EncoderTerminated,

    /// Encoder was killed because a shutdown was requested
    #[error("Encoding aborted by shutdown request")]
    Aborted,

    /// IO error while waiting on the encoder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs one encoder process at a time with cooperative cancellation
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute an encoder command
    ///
    /// # Arguments
    /// * `command` - Encoder command; progress flags are appended here
    /// * `total_duration_secs` - Probed input duration used for percent and ETA
    /// * `cancel` - Shared cancellation state checked on every line
    /// * `on_progress` - Called once per parsed time update, and once more at 100% on success
    ///
    /// # Returns
    /// * `Ok(())` - Encoder exited with status 0
    /// * `Err(EncodeError::Aborted)` - Shutdown was requested; the process was killed and reaped
    /// * `Err(EncodeError)` - Launch failure or non-zero exit
    pub async fn run<F>(
        &self,
        mut command: Command,
        total_duration_secs: f64,
        cancel: &CancellationState,
        mut on_progress: F,
    ) -> Result<(), EncodeError>
    where
        F: FnMut(&ProgressSample),
    {
        command
            .arg("-progress")
            .arg("pipe:1")
            .arg("-nostats")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!("Launching encoder: {:?}", command.as_std());

        let mut child = command.spawn().map_err(EncodeError::Spawn)?;
        let stdout = child.stdout.take().ok_or(EncodeError::NoProgressStream)?;
        let mut lines = BufReader::new(stdout).split(b'\n');

        let started = Instant::now();
        let mut parser = ProgressParser::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.shutdown_requested() => {
                    return abort(&mut child, cancel).await;
                }
                segment = lines.next_segment() => match segment {
                    Ok(Some(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes);
                        if let Some(media_secs) = parser.parse_line(line.trim_end_matches('\r')) {
                            let sample = ProgressSample::compute(
                                media_secs,
                                total_duration_secs,
                                started.elapsed().as_secs_f64(),
                            );
                            on_progress(&sample);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read encoder progress: {}", e);
                        break;
                    }
                }
            }
        }
        // Closing the pipe keeps an encoder still writing from blocking the wait
        drop(lines);

        let status = tokio::select! {
            biased;
            _ = cancel.shutdown_requested() => {
                return abort(&mut child, cancel).await;
            }
            status = child.wait() => status?,
        };

        // The encoder shares our process group, so a terminal Ctrl+C can end it
        // before we observe the flag. Report that as an abort, not a failure.
        if cancel.is_shutdown_requested() {
            cancel.mark_job_aborted();
            return Err(EncodeError::Aborted);
        }

        if status.success() {
            on_progress(&ProgressSample::complete(started.elapsed().as_secs_f64()));
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(EncodeError::EncoderFailed(code)),
                None => Err(EncodeError::EncoderTerminated),
            }
        }
    }
}

/// Kill and reap the encoder after a shutdown request
async fn abort(child: &mut Child, cancel: &CancellationState) -> Result<(), EncodeError> {
    cancel.mark_job_aborted();
    info!("Shutdown requested, killing encoder process");
    // kill() also waits for the process to exit
    if let Err(e) = child.kill().await {
        debug!("Encoder already gone while aborting: {}", e);
    }
    Err(EncodeError::Aborted)
}
