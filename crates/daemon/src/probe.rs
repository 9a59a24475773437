//! Media duration probe
//!
//! Runs `ffprobe` once per file and reads `format.duration` from its JSON
//! output. There is no retry; a failure only affects the file being probed.

use log::debug;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Error type for duration probing
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe could not be launched
    #[error("Failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        source: std::io::Error,
    },

    /// Probe exited with non-zero status
    #[error("Probe failed (exit code {code}): {stderr}")]
    Failed { code: i32, stderr: String },

    /// Output was not the expected JSON document
    #[error("Failed to parse probe output: {0}")]
    Parse(#[from] serde_json::Error),

    /// JSON had no `format.duration`
    #[error("Probe output has no duration")]
    MissingDuration,

    /// Duration field was not numeric
    #[error("Probe duration is not a number: {0}")]
    InvalidDuration(String),

    /// Duration was zero or negative
    #[error("Probe duration must be positive, got {0}")]
    NonPositiveDuration(f64),
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<serde_json::Value>,
}

/// Build the probe command for a single file
pub fn build_probe_command(probe_bin: &str, input: &Path) -> Command {
    let mut cmd = Command::new(probe_bin);
    cmd.arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("json")
        .arg(input);
    cmd
}

/// Extract a positive duration in seconds from probe JSON
pub fn parse_duration_json(json: &str) -> Result<f64, ProbeError> {
    let output: ProbeOutput = serde_json::from_str(json)?;
    let raw = output
        .format
        .and_then(|f| f.duration)
        .ok_or(ProbeError::MissingDuration)?;

    let duration = match raw {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ProbeError::InvalidDuration(s.clone()))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProbeError::InvalidDuration(n.to_string()))?,
        other => return Err(ProbeError::InvalidDuration(other.to_string())),
    };

    if !duration.is_finite() {
        return Err(ProbeError::InvalidDuration(duration.to_string()));
    }
    if duration <= 0.0 {
        return Err(ProbeError::NonPositiveDuration(duration));
    }
    Ok(duration)
}

/// Probe the total media duration of `input` in seconds
pub async fn probe_duration(probe_bin: &str, input: &Path) -> Result<f64, ProbeError> {
    let output = build_probe_command(probe_bin, input)
        .output()
        .await
        .map_err(|source| ProbeError::Spawn {
            bin: probe_bin.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let duration = parse_duration_json(&stdout)?;
    debug!("Probed {}: {:.3}s", input.display(), duration);
    Ok(duration)
}
