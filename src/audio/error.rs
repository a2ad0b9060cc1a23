use std::io;
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Error types specific to audio playback.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("ALSA error: {0}")]
    AlsaError(String),
    #[error("Output device error: {0}")]
    DeviceError(String),
    #[error("Decoding error: {0}")]
    DecodingError(String),
    #[error("Symphonia error: {0}")]
    SymphoniaError(#[from] SymphoniaError),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Missing codec parameters: {0}")]
    MissingCodecParams(&'static str),
    #[error("Initialization error: {0}")]
    InitializationError(String),
    #[error("Resampling error: {0}")]
    ResamplingError(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl From<alsa::Error> for AudioError {
    fn from(e: alsa::Error) -> Self {
        AudioError::AlsaError(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::ResamplingError(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::ResamplingError(e.to_string())
    }
}
