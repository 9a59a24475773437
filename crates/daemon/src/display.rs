//! Terminal rendering for the progress bar, idle spinner and final summary
//!
//! Everything written here is cosmetic. Bars and spinners are drawn with
//! `indicatif` on stdout and are hidden when stdout is not a terminal; plain
//! line writes ignore errors so a broken terminal never interrupts a transcode.

use crate::progress::ProgressSample;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;

const BAR_TEMPLATE: &str = "Progress: |{bar:50}| {msg}";
const BAR_CHARS: &str = "█-";
/// Bar length in hundredths of a percent
const BAR_POSITIONS: u64 = 10_000;
const SPINNER_TEMPLATE: &str = "Waiting for files{spinner}";
/// Spinner frames; the last entry is shown once the spinner finishes
const WAITING_FRAMES: &[&str] = &["   ", ".  ", ".. ", "...", ""];
const SUMMARY_WIDTH: usize = 48;

/// Format whole seconds as `HH:MM:SS`
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (m, s) = (total / 60, total % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Text shown to the right of the bar
pub fn progress_message(percent: f64, elapsed_secs: f64, eta_secs: f64) -> String {
    format!(
        "{:6.2}% | Elapsed: {} | ETA: {}",
        percent.clamp(0.0, 100.0),
        format_hms(elapsed_secs),
        format_hms(eta_secs)
    )
}

/// Bar position for a percentage, in hundredths of a percent
pub fn bar_position(percent: f64) -> u64 {
    if percent.is_nan() {
        return 0;
    }
    (percent.clamp(0.0, 100.0) * 100.0).round() as u64
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars(BAR_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .map(|style| style.tick_strings(WAITING_FRAMES))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Live progress bar for one transcode
pub struct TranscodeProgress {
    bar: ProgressBar,
}

impl TranscodeProgress {
    /// Bar drawn on stdout
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(BAR_POSITIONS), target).with_style(bar_style());
        bar.set_message(progress_message(0.0, 0.0, 0.0));
        Self { bar }
    }

    /// Redraw from one progress sample
    pub fn update(&self, sample: &ProgressSample) {
        self.bar.set_position(bar_position(sample.percent));
        self.bar
            .set_message(progress_message(sample.percent, sample.elapsed_secs, sample.eta_secs));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Leave the completed bar on screen
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Stop drawing and keep the bar where it stopped
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl Default for TranscodeProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotating "Waiting for files" indicator
pub struct WaitingSpinner {
    bar: ProgressBar,
}

impl WaitingSpinner {
    /// Spinner drawn on stdout
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new_spinner().with_style(spinner_style());
        bar.set_draw_target(target);
        Self { bar }
    }

    /// Advance to the next frame
    pub fn tick(&self) {
        self.bar.tick();
    }

    /// Remove the spinner line
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for WaitingSpinner {
    fn default() -> Self {
        Self::new()
    }
}

fn pad_line(label: &str, value: &str) -> String {
    let inner_width = SUMMARY_WIDTH - 4;
    let used = label.chars().count() + value.chars().count();
    let padding = inner_width.saturating_sub(used);
    format!("║ {}{}{} ║", label, value, " ".repeat(padding))
}

/// Render the boxed end-of-run summary
///
/// Sizes are in megabytes. `saved_percent` is relative to the total input.
pub fn render_summary_box(
    file_count: u64,
    total_input_mb: f64,
    total_output_mb: f64,
    saved_percent: f64,
) -> Vec<String> {
    let space_saved = total_input_mb - total_output_mb;
    let rule = "═".repeat(SUMMARY_WIDTH - 2);
    vec![
        format!("╔{}╗", rule),
        format!("║{:^width$}║", "Compression Summary", width = SUMMARY_WIDTH - 2),
        format!("╠{}╣", rule),
        pad_line("Files processed : ", &file_count.to_string()),
        pad_line("Total input     : ", &format!("{:8.2} MB", total_input_mb)),
        pad_line("Total output    : ", &format!("{:8.2} MB", total_output_mb)),
        pad_line(
            "Space saved     : ",
            &format!("{:8.2} MB ({:5.2}%)", space_saved, saved_percent),
        ),
        format!("╚{}╝", rule),
    ]
}

/// Write a full line
pub fn print_line(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{}", text);
    let _ = out.flush();
}
