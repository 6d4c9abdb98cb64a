use thiserror::Error;

/// Errors raised by the spectral gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid denoise parameters: {0}")]
    InvalidParameters(String),

    #[error("Noise clip is empty")]
    EmptyNoiseClip,
}
