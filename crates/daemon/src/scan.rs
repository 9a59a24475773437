//! Scanner module for discovering video files in the input directory.
//!
//! Only regular files directly inside the input directory are considered;
//! the result keeps directory iteration order. When nothing is found the
//! scanner performs a cancellable idle wait before the next poll.

use crate::cancel::CancellationState;
use crate::config::Config;
use crate::display::WaitingSpinner;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// How an idle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The full wait elapsed.
    Elapsed,
    /// Shutdown was requested during the wait.
    Interrupted,
}

/// Checks a file name against the recognized suffixes (case-insensitive).
///
/// Suffixes may be given with or without the leading dot; `.mp4` and `mp4`
/// both match `clip.MP4`.
pub fn has_recognized_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions
        .iter()
        .filter(|ext| !ext.is_empty())
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Lists eligible file names directly inside `dir`.
///
/// An unreadable `dir` is an error; unreadable individual entries are logged
/// and skipped.
pub fn scan_input_dir(dir: &Path, extensions: &[String]) -> Result<Vec<String>, walkdir::Error> {
    let mut names = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 file name: {}", entry.path().display());
            continue;
        };

        if has_recognized_extension(name, extensions) {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Waits up to `wait_secs` whole seconds, returning early on shutdown.
///
/// The shutdown flag is checked at least once per second and the wait also
/// wakes as soon as it is set. A rotating indicator is drawn meanwhile.
pub async fn idle_wait(wait_secs: u64, cancel: &CancellationState) -> IdleOutcome {
    let spinner = WaitingSpinner::new();
    let mut outcome = IdleOutcome::Elapsed;

    for _ in 0..wait_secs {
        if cancel.is_shutdown_requested() {
            outcome = IdleOutcome::Interrupted;
            break;
        }
        spinner.tick();

        tokio::select! {
            biased;
            _ = cancel.shutdown_requested() => {
                outcome = IdleOutcome::Interrupted;
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    spinner.finish();

    if cancel.is_shutdown_requested() {
        IdleOutcome::Interrupted
    } else {
        outcome
    }
}

/// Input directory poller bound to one configuration.
#[derive(Debug, Clone)]
pub struct BatchScanner {
    input_dir: PathBuf,
    extensions: Vec<String>,
    retry_wait_secs: u64,
}

impl BatchScanner {
    pub fn new(input_dir: PathBuf, extensions: Vec<String>, retry_wait_secs: u64) -> Self {
        Self {
            input_dir,
            extensions,
            retry_wait_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.input_folder.clone(),
            config.video_extensions.clone(),
            config.retry_wait_seconds,
        )
    }

    pub fn retry_wait_secs(&self) -> u64 {
        self.retry_wait_secs
    }

    /// Lists eligible files for one poll cycle.
    pub fn scan(&self) -> Result<Vec<String>, walkdir::Error> {
        scan_input_dir(&self.input_dir, &self.extensions)
    }

    /// Idle wait used when a scan came back empty.
    pub async fn idle_wait(&self, cancel: &CancellationState) -> IdleOutcome {
        idle_wait(self.retry_wait_secs, cancel).await
    }
}
