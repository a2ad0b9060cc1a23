use crate::audio::{BackendFormat, TrackDescriptor};
use serde::Serialize;
use std::path::PathBuf;

/// Lifecycle of the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    /// Whether a track is installed that volume and pause requests can act on.
    pub fn has_track(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

/// A track accepted by `start_track`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInfo {
    pub id: u64,
    #[serde(flatten)]
    pub descriptor: TrackDescriptor,
}

/// Snapshot of the session for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub track: Option<TrackInfo>,
    pub gain: Option<f64>,
    pub multiplier: Option<f64>,
    pub paused: bool,
    pub open_handles: usize,
    pub backend: Option<BackendFormat>,
}

/// Updates broadcast by the session about its state changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { id: u64, path: PathBuf },
    Paused { id: u64 },
    Resumed { id: u64 },
    VolumeChanged { id: u64, gain: f64 },
    Stopped { id: u64 },
    Finished { id: u64 },
    Error { id: Option<u64>, message: String },
}
