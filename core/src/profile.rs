//! Named denoising presets.

use crate::error::GateError;

/// Parameters handed to a [`crate::Denoiser`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    /// Estimate a single noise floor from the clip instead of tracking it over time
    pub stationary: bool,
    /// Fraction of the detected noise to remove, in (0, 1]
    pub prop_decrease: f32,
    /// FFT size, a power of two
    pub n_fft: usize,
    /// Analysis window length, at most `n_fft`
    pub win_length: usize,
    /// Frame advance, shorter than `win_length`
    pub hop_length: usize,
    /// Standard deviations above the noise mean a bin must reach to be kept
    pub n_std_thresh_stationary: f32,
}

impl NoiseProfile {
    /// Check the parameters are usable for an STFT.
    pub fn validate(&self) -> Result<(), GateError> {
        if !self.n_fft.is_power_of_two() {
            return Err(GateError::InvalidParameters(format!(
                "n_fft {} is not a power of two",
                self.n_fft
            )));
        }
        if self.win_length == 0 || self.win_length > self.n_fft {
            return Err(GateError::InvalidParameters(format!(
                "win_length {} must be in 1..={}",
                self.win_length, self.n_fft
            )));
        }
        if self.hop_length == 0 || self.hop_length >= self.win_length {
            return Err(GateError::InvalidParameters(format!(
                "hop_length {} must be in 1..{}",
                self.hop_length, self.win_length
            )));
        }
        if !(self.prop_decrease > 0.0 && self.prop_decrease <= 1.0) {
            return Err(GateError::InvalidParameters(format!(
                "prop_decrease {} must be in (0, 1]",
                self.prop_decrease
            )));
        }
        if !(self.n_std_thresh_stationary > 0.0) {
            return Err(GateError::InvalidParameters(format!(
                "n_std_thresh_stationary {} must be positive",
                self.n_std_thresh_stationary
            )));
        }
        Ok(())
    }
}

pub const DEFAULT_PROFILE_NAME: &str = "default";

const PRESETS: [(&str, NoiseProfile); 5] = [
    // Short transients: small FFT for time resolution.
    (
        "footsteps",
        NoiseProfile {
            stationary: true,
            prop_decrease: 0.9,
            n_fft: 512,
            win_length: 512,
            hop_length: 128,
            n_std_thresh_stationary: 1.5,
        },
    ),
    // Broadband and changing: large FFT for frequency resolution.
    (
        "rain",
        NoiseProfile {
            stationary: false,
            prop_decrease: 0.8,
            n_fft: 2048,
            win_length: 2048,
            hop_length: 512,
            n_std_thresh_stationary: 2.0,
        },
    ),
    // Gentler reduction, wind bleeds into the voice band.
    (
        "wind",
        NoiseProfile {
            stationary: false,
            prop_decrease: 0.7,
            n_fft: 1024,
            win_length: 1024,
            hop_length: 256,
            n_std_thresh_stationary: 1.8,
        },
    ),
    (
        "voice",
        NoiseProfile {
            stationary: true,
            prop_decrease: 1.0,
            n_fft: 1024,
            win_length: 1024,
            hop_length: 256,
            n_std_thresh_stationary: 1.5,
        },
    ),
    (
        DEFAULT_PROFILE_NAME,
        NoiseProfile {
            stationary: true,
            prop_decrease: 0.95,
            n_fft: 1024,
            win_length: 1024,
            hop_length: 256,
            n_std_thresh_stationary: 1.7,
        },
    ),
];

/// Preset names in table order.
pub const PRESET_NAMES: [&str; 5] = ["footsteps", "rain", "wind", "voice", DEFAULT_PROFILE_NAME];

/// Look up a preset by name (case-insensitive).
pub fn find_profile(name: &str) -> Option<NoiseProfile> {
    PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name.trim()))
        .map(|(_, profile)| *profile)
}

/// Look up a preset by name, falling back to `default` for unknown names.
pub fn resolve_profile(name: &str) -> NoiseProfile {
    find_profile(name).unwrap_or_else(default_profile)
}

pub fn default_profile() -> NoiseProfile {
    PRESETS[PRESETS.len() - 1].1
}
