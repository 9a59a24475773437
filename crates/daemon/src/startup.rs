//! Startup checks module for the batch compressor
//!
//! Provides preflight checks run before the first scan:
//! - Encoder availability (`<encoder_bin> -version`)
//! - Probe availability (`<probe_bin> -version`)
//! - Creation of the input, output and archive directories

use crate::config::Config;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{bin} not available: {reason}")]
    ToolUnavailable { bin: String, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Extract the version token from `-version` output
///
/// Handles the usual banner forms:
/// - Standard: "ffmpeg version 6.1.1 Copyright ..."
/// - Git builds: "ffprobe version N-112345-gabcdef ..."
pub fn parse_tool_version(version_output: &str) -> Option<String> {
    let first = version_output.lines().find(|l| l.contains(" version "))?;
    let rest = first.split(" version ").nth(1)?;
    rest.split_whitespace().next().map(str::to_string)
}

/// Check that `bin` can be launched by running `<bin> -version`
///
/// # Returns
/// * `Ok(Some(version))` - Tool ran and printed a recognizable banner
/// * `Ok(None)` - Tool ran but the banner had no version token
/// * `Err(StartupError::ToolUnavailable)` - Tool missing or exited non-zero
pub fn check_tool_available(bin: &str) -> Result<Option<String>, StartupError> {
    let output = Command::new(bin)
        .arg("-version")
        .output()
        .map_err(|e| StartupError::ToolUnavailable {
            bin: bin.to_string(),
            reason: format!("{} -version failed; is it installed and in PATH? Error: {}", bin, e),
        })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable {
            bin: bin.to_string(),
            reason: format!(
                "{} -version exited with {}",
                bin,
                output
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
            ),
        });
    }

    Ok(parse_tool_version(&String::from_utf8_lossy(&output.stdout)))
}

/// Create the input, output and archive directories if absent
pub fn ensure_directories(cfg: &Config) -> Result<(), StartupError> {
    for dir in [&cfg.input_folder, &cfg.output_folder, &cfg.archive_folder] {
        fs::create_dir_all(dir).map_err(|source| StartupError::CreateDir {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Run all startup checks
///
/// Checks are run in the following order:
/// 1. Encoder availability
/// 2. Probe availability
pub fn run_startup_checks(cfg: &Config) -> Result<(), StartupError> {
    for bin in [&cfg.encoder_bin, &cfg.probe_bin] {
        match check_tool_available(bin)? {
            Some(version) => info!("Found {} version {}", bin, version),
            None => info!("Found {}", bin),
        }
    }
    Ok(())
}
