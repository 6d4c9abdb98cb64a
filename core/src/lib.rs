//! # Batch Denoise Core Library
//!
//! Signal-side building blocks for denoising a recording from a noise
//! sample taken out of the recording itself:
//!
//! - [`parse_time_range`] turns a position expression (`start`, `end`,
//!   `10.5-12.0`, `5%`, `3`) into a [`TimeInterval`]
//! - [`extract_noise_clip`] clamps that interval and slices the samples
//! - [`resolve_profile`] picks one of the fixed [`NoiseProfile`] presets
//! - [`SpectralGate`] implements [`Denoiser`] by spectral gating
//!
//! This library has no file I/O dependencies.
//!
//! ## Example
//!
//! ```rust
//! use batch_denoise_core::{
//!     extract_noise_clip, parse_time_range, resolve_profile, AudioTrack, Denoiser, SpectralGate,
//! };
//!
//! let track = AudioTrack::new(vec![0.0; 16000], 8000);
//! let range = parse_time_range("start", track.duration_secs(), 1.0);
//! let clip = extract_noise_clip(&track.samples, track.sample_rate, range.interval, track.duration_secs());
//!
//! let profile = resolve_profile("voice");
//! let cleaned = SpectralGate::new()
//!     .denoise(&track.samples, clip, track.sample_rate, &profile)
//!     .unwrap();
//! assert_eq!(cleaned.len(), track.len());
//! ```

pub mod clip;
pub mod error;
pub mod gate;
pub mod profile;
pub mod time_range;
pub mod track;

pub use clip::{clamp_interval, extract_noise_clip, MIN_CLIP_SECS};
pub use error::GateError;
pub use gate::{Denoiser, SpectralGate, DEFAULT_CHUNK_SIZE};
pub use profile::{
    default_profile, find_profile, resolve_profile, NoiseProfile, DEFAULT_PROFILE_NAME, PRESET_NAMES,
};
pub use time_range::{parse_time_range, ParsedRange, RangeWarning, TimeInterval};
pub use track::AudioTrack;
