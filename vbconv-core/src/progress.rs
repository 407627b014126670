//! Parser for ffmpeg's `-progress` key/value stream.
//!
//! With `-progress pipe:1` ffmpeg writes blocks of `key=value` lines to stdout.
//! Only `out_time_ms` is used for percentage reporting; despite its name the
//! value is in microseconds.

const OUT_TIME_KEY: &str = "out_time_ms";

/// Turns `out_time_ms` lines into a percentage of the known duration.
#[derive(Debug, Clone, Copy)]
pub struct ProgressParser {
    duration_us: Option<f64>,
}

impl ProgressParser {
    /// A parser for a stream of the given duration. A duration that is not a
    /// positive finite number disables percentage reporting.
    #[must_use]
    pub fn new(duration_secs: f64) -> Self {
        let duration_us = (duration_secs.is_finite() && duration_secs > 0.0)
            .then(|| duration_secs * 1_000_000.0);
        Self { duration_us }
    }

    /// Whether this parser can produce percentages at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.duration_us.is_some()
    }

    /// Percentage in `0.0..=100.0` for an `out_time_ms=<int>` line, `None` for
    /// anything else (other keys, `N/A`, malformed values, unknown duration).
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<f64> {
        let duration_us = self.duration_us?;
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != OUT_TIME_KEY {
            return None;
        }
        let out_time_us = value.trim().parse::<i64>().ok()?;
        let percent = out_time_us as f64 / duration_us * 100.0;
        Some(percent.clamp(0.0, 100.0))
    }
}

/// True when `line` carries the `out_time_ms` key, whatever its value.
#[must_use]
pub fn is_progress_marker(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .is_some_and(|(key, _)| key.trim() == OUT_TIME_KEY)
}
