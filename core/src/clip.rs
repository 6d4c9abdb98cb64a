//! Noise clip extraction.

use crate::time_range::TimeInterval;

/// Shortest clip ever produced, in seconds.
pub const MIN_CLIP_SECS: f64 = 0.1;

/// Clamp `interval` into `[0, total_duration]`, keeping at least
/// [`MIN_CLIP_SECS`] between start and end.
pub fn clamp_interval(interval: TimeInterval, total_duration: f64) -> TimeInterval {
    let start = interval.start.min(total_duration - MIN_CLIP_SECS).max(0.0);
    let end = interval.end.min(total_duration).max(start + MIN_CLIP_SECS);
    TimeInterval::new(start, end)
}

/// Slice the samples covered by `interval` out of a mono `signal`.
///
/// The interval is clamped first, so any input yields a slice of the signal;
/// for tracks of at least 0.2 s the slice is never empty.
pub fn extract_noise_clip(
    signal: &[f32],
    sample_rate: u32,
    interval: TimeInterval,
    total_duration: f64,
) -> &[f32] {
    let clamped = clamp_interval(interval, total_duration);
    let rate = sample_rate as f64;

    let end = to_index(clamped.end * rate, signal.len());
    let start = to_index(clamped.start * rate, signal.len()).min(end);

    &signal[start..end]
}

fn to_index(position: f64, len: usize) -> usize {
    (position.round().max(0.0) as usize).min(len)
}
