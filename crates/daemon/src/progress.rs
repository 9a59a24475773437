//! Encoder progress parsing
//!
//! The encoder is started with `-progress pipe:1`, which makes it write blocks
//! of `key=value` lines to stdout. Only the cumulative output-time counter is
//! needed here; everything else is ignored.

/// Raw percentages above this are reported as exactly 100%
pub const SNAP_TO_COMPLETE_PERCENT: f64 = 99.5;

/// Keys carrying the cumulative output time in microseconds.
///
/// `out_time_ms` is historically misnamed and is microseconds as well.
const OUT_TIME_KEYS: &[&str] = &["out_time_ms", "out_time_us"];

/// Extract the microsecond counter from a single progress line
///
/// Returns `None` for any other key and for values that are not plain
/// unsigned integers (`N/A`, negative start-up values, garbage).
pub fn parse_out_time_us(line: &str) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    if !OUT_TIME_KEYS.contains(&key.trim()) {
        return None;
    }

    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Stateful parser yielding non-decreasing media time in seconds
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    high_water_secs: f64,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of progress output
    ///
    /// Returns the elapsed media time in seconds when the line is a time
    /// update. A counter that goes backwards does not move the value down.
    pub fn parse_line(&mut self, line: &str) -> Option<f64> {
        let micros = parse_out_time_us(line)?;
        let secs = micros as f64 / 1_000_000.0;
        if secs > self.high_water_secs {
            self.high_water_secs = secs;
        }
        Some(self.high_water_secs)
    }
}

/// Clamp a raw percentage into `[0, 100]`, snapping the last half percent to 100
pub fn clamp_percent(raw: f64) -> f64 {
    if raw.is_nan() || raw <= 0.0 {
        0.0
    } else if raw > SNAP_TO_COMPLETE_PERCENT {
        100.0
    } else {
        raw
    }
}

/// One normalized progress update for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Percent complete, 0–100
    pub percent: f64,
    /// Wall-clock seconds since the encoder was launched
    pub elapsed_secs: f64,
    /// Estimated wall-clock seconds remaining, 0 while percent is 0
    pub eta_secs: f64,
}

impl ProgressSample {
    /// Build a sample from media progress and wall-clock time
    ///
    /// # Arguments
    /// * `media_secs` - Media time encoded so far
    /// * `total_duration_secs` - Probed duration of the input
    /// * `wall_elapsed_secs` - Time since the encoder was launched
    pub fn compute(media_secs: f64, total_duration_secs: f64, wall_elapsed_secs: f64) -> Self {
        let raw = if total_duration_secs > 0.0 {
            media_secs / total_duration_secs * 100.0
        } else {
            0.0
        };
        let percent = clamp_percent(raw);
        let eta_secs = if percent > 0.0 {
            (wall_elapsed_secs / (percent / 100.0) - wall_elapsed_secs).max(0.0)
        } else {
            0.0
        };

        Self {
            percent,
            elapsed_secs: wall_elapsed_secs,
            eta_secs,
        }
    }

    /// Final sample emitted when the encoder exits cleanly
    pub fn complete(wall_elapsed_secs: f64) -> Self {
        Self {
            percent: 100.0,
            elapsed_secs: wall_elapsed_secs,
            eta_secs: 0.0,
        }
    }
}
