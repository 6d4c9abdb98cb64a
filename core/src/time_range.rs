//! Parsing of noise-position expressions into time intervals.
//!
//! Accepted forms: `start`, `end`, `<start>-<end>`, `<percent>%` and a bare
//! position in seconds. Parsing never fails; malformed input degrades to the
//! `start` window and the caller receives a [`RangeWarning`] to report.

use std::fmt;

/// A time window in seconds. Not clamped to the track: see [`crate::clip`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Emitted when an expression could not be understood and the default
/// window was used instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeWarning {
    pub expression: String,
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not parse noise position '{}', using the start of the track",
            self.expression
        )
    }
}

/// Result of [`parse_time_range`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRange {
    pub interval: TimeInterval,
    pub warning: Option<RangeWarning>,
}

/// Parse `expr` against a track of `total_duration` seconds.
///
/// `default_len` is the window length used by `start`, `end` and a bare
/// position, and by the fallback window.
pub fn parse_time_range(expr: &str, total_duration: f64, default_len: f64) -> ParsedRange {
    let trimmed = expr.trim();

    if trimmed.eq_ignore_ascii_case("start") {
        return ParsedRange::ok(0.0, default_len);
    }
    if trimmed.eq_ignore_ascii_case("end") {
        return ParsedRange::ok(total_duration - default_len, total_duration);
    }

    match parse_numeric(trimmed, total_duration, default_len) {
        Some(interval) => ParsedRange {
            interval,
            warning: None,
        },
        None => ParsedRange {
            interval: TimeInterval::new(0.0, default_len),
            warning: Some(RangeWarning {
                expression: expr.to_string(),
            }),
        },
    }
}

impl ParsedRange {
    fn ok(start: f64, end: f64) -> Self {
        Self {
            interval: TimeInterval::new(start, end),
            warning: None,
        }
    }
}

fn parse_numeric(expr: &str, total_duration: f64, default_len: f64) -> Option<TimeInterval> {
    if expr.contains('%') {
        let percent = parse_seconds(expr.trim_matches('%'))?;
        return Some(TimeInterval::new(0.0, total_duration * percent / 100.0));
    }

    if expr.contains('-') {
        let mut parts = expr.split('-');
        let (start, end) = match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => (parse_seconds(start)?, parse_seconds(end)?),
            _ => return None,
        };
        return Some(TimeInterval::new(start, end));
    }

    let position = parse_seconds(expr)?;
    Some(TimeInterval::new(position, position + default_len))
}

fn parse_seconds(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
