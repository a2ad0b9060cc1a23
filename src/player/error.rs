use thiserror::Error;

/// Errors returned by playback session operations. None of them end the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("cannot resolve {path}: {reason}")]
    ResolveFailed { path: String, reason: String },
    #[error("cannot decode {path}: {reason}")]
    DecodeFailed { path: String, reason: String },
    #[error("audio output initialization failed: {0}")]
    BackendInitFailed(String),
    #[error("No music is currently playing")]
    NoActiveTrack,
    #[error("playback start was interrupted by a stop request")]
    Interrupted,
    #[error("internal playback error: {0}")]
    Internal(String),
}
