use std::path::PathBuf;

use batch_denoise_core::GateError;
use thiserror::Error;

/// Per-file processing errors. Never abort a batch.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("No audio track found in {0}")]
    NoTrack(PathBuf),

    #[error("Audio track in {0} is empty")]
    EmptyTrack(PathBuf),

    #[error("Failed to write WAV {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to encode FLAC {path}: {message}")]
    Flac { path: PathBuf, message: String },

    #[error("Failed to transcode {path}: {message}")]
    Transcode { path: PathBuf, message: String },

    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input path does not exist: {0}")]
    InputNotFound(PathBuf),
}
