//! Spectral gating.
//!
//! The signal is taken through an STFT, every time-frequency bin is compared
//! against a noise threshold learned from the noise clip, and bins under the
//! threshold are attenuated before resynthesis by overlap-add.
//!
//! Long signals are resynthesised a chunk of samples at a time. Each chunk is
//! analysed with every frame that overlaps it plus the neighbouring frames
//! the time smoothing reaches, so the output does not depend on the chunk
//! size and memory stays proportional to it.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::ops::Range;
use std::sync::Arc;

use crate::error::GateError;
use crate::profile::NoiseProfile;

/// Samples resynthesised per STFT pass unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 600_000;

const EPSILON: f32 = 1e-10;
const FREQ_MASK_SMOOTH_HZ: f32 = 500.0;
const TIME_MASK_SMOOTH_MS: f32 = 50.0;
/// Time constant of the running noise estimate in non-stationary mode
const TIME_CONSTANT_SECS: f32 = 2.0;
const NONSTATIONARY_THRESH: f32 = 2.0;
const SIGMOID_SLOPE: f32 = 10.0;

/// Removes noise from a signal given a reference clip of that noise.
pub trait Denoiser {
    /// Returns a cleaned signal of the same length as `signal`.
    fn denoise(
        &mut self,
        signal: &[f32],
        noise: &[f32],
        sample_rate: u32,
        profile: &NoiseProfile,
    ) -> Result<Vec<f32>, GateError>;
}

/// FFT-based spectral gate.
pub struct SpectralGate {
    planner: FftPlanner<f32>,
    chunk_size: usize,
}

impl SpectralGate {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Resynthesise at most `chunk_size` samples per STFT pass.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        SpectralGate {
            planner: FftPlanner::new(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for SpectralGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Denoiser for SpectralGate {
    fn denoise(
        &mut self,
        signal: &[f32],
        noise: &[f32],
        sample_rate: u32,
        profile: &NoiseProfile,
    ) -> Result<Vec<f32>, GateError> {
        profile.validate()?;
        if sample_rate == 0 {
            return Err(GateError::InvalidParameters("sample rate is zero".to_string()));
        }
        if noise.is_empty() {
            return Err(GateError::EmptyNoiseClip);
        }
        if signal.is_empty() {
            return Ok(Vec::new());
        }

        let mut stft = Stft::new(&mut self.planner, profile);
        let mut floor = NoiseFloor::learn(&mut stft, noise, sample_rate, profile);
        let smoothing = MaskSmoothing::new(sample_rate, profile);
        let total_frames = stft.frame_count(signal.len());

        let mut output = Vec::with_capacity(signal.len());
        let mut start = 0;
        while start < signal.len() {
            let end = start.saturating_add(self.chunk_size).min(signal.len());
            let core = stft.frames_covering(start..end, total_frames);
            let context = core.start.saturating_sub(smoothing.margin())
                ..(core.end + smoothing.margin()).min(total_frames);
            // Where the next chunk's context begins; the running estimate
            // restarts from there.
            let resume_at = stft
                .frames_covering(end..end + 1, total_frames)
                .start
                .saturating_sub(smoothing.margin());

            let mut spectrum = stft.analyze(signal, context.clone());
            floor.rewind();
            let mut mask = Vec::with_capacity(spectrum.len());
            for (frame, f) in spectrum.iter().zip(context.clone()) {
                if f == resume_at {
                    floor.checkpoint();
                }
                mask.push(floor.gate(&magnitudes(frame)));
            }
            smoothing.apply(&mut mask);

            let local = core.start - context.start..core.end - context.start;
            let mut frames: Vec<_> = spectrum.drain(local.clone()).collect();
            apply_mask(&mut frames, &mask[local], profile.prop_decrease);
            output.extend(stft.synthesize(frames, core.start, start..end));

            start = end;
        }

        Ok(output)
    }
}

/// Short-time Fourier transform with a Hann analysis window.
///
/// Frames are numbered from the start of the signal padded with `n_fft / 2`
/// zeros in front: frame `f` covers padded positions `f * hop..f * hop + n_fft`.
struct Stft {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    n_fft: usize,
    hop: usize,
}

impl Stft {
    fn new(planner: &mut FftPlanner<f32>, profile: &NoiseProfile) -> Self {
        let n_fft = profile.n_fft;
        let fft = planner.plan_fft_forward(n_fft);
        let ifft = planner.plan_fft_inverse(n_fft);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        Stft {
            fft,
            ifft,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            window: hann_window(n_fft, profile.win_length),
            n_fft,
            hop: profile.hop_length,
        }
    }

    fn front(&self) -> usize {
        self.n_fft / 2
    }

    /// Number of frames starting at or before the last sample of a signal
    /// of `len` samples.
    fn frame_count(&self, len: usize) -> usize {
        (len + self.front()).saturating_sub(1) / self.hop + 1
    }

    /// Frames overlapping the non-empty sample range `samples`.
    fn frames_covering(&self, samples: Range<usize>, total: usize) -> Range<usize> {
        let first = samples.start + self.front();
        let last = samples.end - 1 + self.front();
        let start = (first + self.hop).saturating_sub(self.n_fft) / self.hop;
        let end = (last / self.hop + 1).min(total);
        start.min(end)..end
    }

    fn forward(&mut self, samples: &[f32], frame: usize) -> Vec<Complex<f32>> {
        let front = self.front();
        let start = frame * self.hop;
        let mut buffer: Vec<Complex<f32>> = (start..start + self.n_fft)
            .zip(&self.window)
            .map(|(pos, &w)| {
                let x = pos
                    .checked_sub(front)
                    .and_then(|i| samples.get(i))
                    .copied()
                    .unwrap_or(0.0);
                Complex::new(x * w, 0.0)
            })
            .collect();
        self.fft.process_with_scratch(&mut buffer, &mut self.scratch);
        buffer
    }

    fn analyze(&mut self, samples: &[f32], frames: Range<usize>) -> Vec<Vec<Complex<f32>>> {
        frames.map(|f| self.forward(samples, f)).collect()
    }

    /// Overlap-add `frames`, numbered from `first_frame`, and return the
    /// output for `samples`.
    fn synthesize(
        &mut self,
        frames: Vec<Vec<Complex<f32>>>,
        first_frame: usize,
        samples: Range<usize>,
    ) -> Vec<f32> {
        let base = samples.start + self.front();
        let len = samples.len();
        let mut output = vec![0.0f32; len];
        let mut window_sum = vec![0.0f32; len];
        let scale = self.n_fft as f32;

        for (f, mut spectrum) in (first_frame..).zip(frames) {
            let start = f * self.hop;
            self.ifft.process_with_scratch(&mut spectrum, &mut self.scratch);

            for (i, bin) in spectrum.iter().enumerate() {
                if let Some(pos) = (start + i).checked_sub(base).filter(|&pos| pos < len) {
                    output[pos] += bin.re / scale;
                    window_sum[pos] += self.window[i];
                }
            }
        }

        output
            .iter()
            .zip(&window_sum)
            .map(|(&sample, &ws)| if ws > 1e-6 { sample / ws } else { 0.0 })
            .collect()
    }
}

/// Hann window of `win_length` centred in a frame of `n_fft`.
fn hann_window(n_fft: usize, win_length: usize) -> Vec<f32> {
    let offset = (n_fft - win_length) / 2;
    let mut window = vec![0.0f32; n_fft];
    for i in 0..win_length {
        window[offset + i] = 0.5 * (1.0 - (2.0 * PI * i as f32 / (win_length - 1) as f32).cos());
    }
    window
}

/// Magnitudes of the non-negative frequency bins of one frame.
fn magnitudes(frame: &[Complex<f32>]) -> Vec<f32> {
    frame[..frame.len() / 2 + 1].iter().map(|c| c.norm()).collect()
}

fn to_db(magnitude: f32) -> f32 {
    20.0 * magnitude.max(EPSILON).log10()
}

/// Per-bin reference the signal is gated against, learned from the noise clip.
enum NoiseFloor {
    /// dB threshold at the clip's mean plus `n_std` standard deviations
    Stationary { threshold_db: Vec<f32> },
    /// Running, time-smoothed magnitude seeded with the clip's mean
    Running {
        estimate: Vec<f32>,
        saved: Vec<f32>,
        coefficient: f32,
    },
}

impl NoiseFloor {
    fn learn(stft: &mut Stft, noise: &[f32], sample_rate: u32, profile: &NoiseProfile) -> Self {
        let bins = profile.n_fft / 2 + 1;
        let frames = stft.frame_count(noise.len());
        let mut sums = vec![(0.0f64, 0.0f64); bins];

        for f in 0..frames {
            let spectrum = stft.forward(noise, f);
            for ((sum, sum_sq), mag) in sums.iter_mut().zip(magnitudes(&spectrum)) {
                let value = f64::from(if profile.stationary { to_db(mag) } else { mag });
                *sum += value;
                *sum_sq += value * value;
            }
        }

        let count = frames as f64;
        if profile.stationary {
            let n_std = profile.n_std_thresh_stationary as f64;
            let threshold_db = sums
                .iter()
                .map(|&(sum, sum_sq)| {
                    let mean = sum / count;
                    let std = (sum_sq / count - mean * mean).max(0.0).sqrt();
                    (mean + std * n_std) as f32
                })
                .collect();
            NoiseFloor::Stationary { threshold_db }
        } else {
            let estimate: Vec<f32> = sums.iter().map(|&(sum, _)| (sum / count) as f32).collect();
            let t_frames = TIME_CONSTANT_SECS * sample_rate as f32 / profile.hop_length as f32;
            let coefficient =
                ((1.0 + 4.0 * t_frames * t_frames).sqrt() - 1.0) / (2.0 * t_frames * t_frames);
            NoiseFloor::Running {
                saved: estimate.clone(),
                estimate,
                coefficient,
            }
        }
    }

    /// Gain per bin for the next frame, 1 for signal and 0 for noise.
    fn gate(&mut self, magnitudes: &[f32]) -> Vec<f32> {
        match self {
            NoiseFloor::Stationary { threshold_db } => magnitudes
                .iter()
                .zip(threshold_db.iter())
                .map(|(&mag, &t)| if to_db(mag) > t { 1.0 } else { 0.0 })
                .collect(),
            NoiseFloor::Running {
                estimate,
                coefficient,
                ..
            } => {
                let b = *coefficient;
                magnitudes
                    .iter()
                    .zip(estimate.iter_mut())
                    .map(|(&mag, s)| {
                        *s = b * mag + (1.0 - b) * *s;
                        let ratio = (mag - *s) / (*s + EPSILON);
                        1.0 / (1.0 + (-SIGMOID_SLOPE * (ratio - NONSTATIONARY_THRESH)).exp())
                    })
                    .collect()
            }
        }
    }

    fn checkpoint(&mut self) {
        if let NoiseFloor::Running { estimate, saved, .. } = self {
            saved.copy_from_slice(estimate);
        }
    }

    /// Go back to the last checkpoint, or the seed if there was none.
    fn rewind(&mut self) {
        if let NoiseFloor::Running { estimate, saved, .. } = self {
            estimate.copy_from_slice(saved);
        }
    }
}

/// Triangular smoothing over frequency, then over time.
struct MaskSmoothing {
    freq_kernel: Option<Vec<f32>>,
    time_kernel: Option<Vec<f32>>,
}

impl MaskSmoothing {
    fn new(sample_rate: u32, profile: &NoiseProfile) -> Self {
        let bin_hz = sample_rate as f32 / (profile.n_fft / 2) as f32;
        let frame_ms = profile.hop_length as f32 / sample_rate as f32 * 1000.0;
        let n_freq = (FREQ_MASK_SMOOTH_HZ / bin_hz) as usize;
        let n_time = (TIME_MASK_SMOOTH_MS / frame_ms) as usize;

        MaskSmoothing {
            freq_kernel: (n_freq > 0).then(|| triangle_kernel(n_freq)),
            time_kernel: (n_time > 0).then(|| triangle_kernel(n_time)),
        }
    }

    /// Frames on either side that a smoothed frame depends on.
    fn margin(&self) -> usize {
        self.time_kernel.as_ref().map_or(0, |kernel| kernel.len() / 2)
    }

    fn apply(&self, mask: &mut [Vec<f32>]) {
        if let Some(kernel) = &self.freq_kernel {
            for frame in mask.iter_mut() {
                *frame = smooth_line(frame, kernel);
            }
        }

        if let Some(kernel) = &self.time_kernel {
            if mask.len() > 1 {
                let bins = mask[0].len();
                for k in 0..bins {
                    let column: Vec<f32> = mask.iter().map(|frame| frame[k]).collect();
                    for (frame, value) in mask.iter_mut().zip(smooth_line(&column, kernel)) {
                        frame[k] = value;
                    }
                }
            }
        }
    }
}

fn triangle_kernel(half_width: usize) -> Vec<f32> {
    let peak = (half_width + 1) as f32;
    (0..=2 * half_width)
        .map(|i| (peak - i.abs_diff(half_width) as f32) / peak)
        .collect()
}

/// Convolve with `kernel`, renormalising at the edges.
fn smooth_line(values: &[f32], kernel: &[f32]) -> Vec<f32> {
    let half = kernel.len() / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(values.len() - 1);
            let (sum, weight) = (lo..=hi).fold((0.0f32, 0.0f32), |(sum, weight), j| {
                let w = kernel[j + half - i];
                (sum + w * values[j], weight + w)
            });
            sum / weight
        })
        .collect()
}

fn apply_mask(spectrum: &mut [Vec<Complex<f32>>], mask: &[Vec<f32>], prop_decrease: f32) {
    for (frame, gains) in spectrum.iter_mut().zip(mask) {
        let n_fft = frame.len();
        for (i, bin) in frame.iter_mut().enumerate() {
            let k = i.min(n_fft - i);
            let gain = gains[k] * prop_decrease + (1.0 - prop_decrease);
            *bin *= gain;
        }
    }
}
