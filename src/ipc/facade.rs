//! Maps control calls onto the playback session.

use crate::ipc::protocol::{Call, ProtocolError, Request, Response};
use crate::player::{PlaybackError, PlaybackSession, SessionStatus, TrackInfo};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, warn};

const LOG_TARGET: &str = "koalad::ipc::facade";

/// The operations reachable over IPC.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    async fn play_music(&self, path: PathBuf) -> Result<TrackInfo, PlaybackError>;
    /// Returns the gain after applying `delta`.
    async fn set_volume(&self, delta: f64) -> Result<f64, PlaybackError>;
    /// Returns whether playback is now paused.
    async fn pause_or_unpause(&self) -> Result<bool, PlaybackError>;
    /// Returns whether anything was playing.
    async fn stop(&self) -> Result<bool, PlaybackError>;
    async fn status(&self) -> Result<SessionStatus, PlaybackError>;
}

/// [`ControlSurface`] backed by a [`PlaybackSession`]. Session calls may block,
/// so they run on the blocking pool.
#[derive(Clone)]
pub struct SessionFacade {
    session: PlaybackSession,
}

impl SessionFacade {
    pub fn new(session: PlaybackSession) -> Self {
        Self { session }
    }

    async fn run<T, F>(&self, call: F) -> Result<T, PlaybackError>
    where
        T: Send + 'static,
        F: FnOnce(PlaybackSession) -> Result<T, PlaybackError> + Send + 'static,
    {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || call(session))
            .await
            .map_err(|e| PlaybackError::Internal(format!("session task failed: {}", e)))?
    }
}

#[async_trait]
impl ControlSurface for SessionFacade {
    async fn play_music(&self, path: PathBuf) -> Result<TrackInfo, PlaybackError> {
        self.run(move |session| session.start_track(&path)).await
    }

    async fn set_volume(&self, delta: f64) -> Result<f64, PlaybackError> {
        self.run(move |session| session.set_volume_delta(delta)).await
    }

    async fn pause_or_unpause(&self) -> Result<bool, PlaybackError> {
        self.run(|session| session.toggle_pause()).await
    }

    async fn stop(&self) -> Result<bool, PlaybackError> {
        self.run(|session| Ok(session.stop())).await
    }

    async fn status(&self) -> Result<SessionStatus, PlaybackError> {
        self.run(|session| Ok(session.status())).await
    }
}

/// Runs one call and shapes its result as response data.
pub async fn dispatch(surface: &dyn ControlSurface, call: Call) -> Result<Value, PlaybackError> {
    match call {
        Call::PlayMusic(path) => {
            let track = surface.play_music(path).await?;
            Ok(json!({ "message": "music played successfully", "track": track }))
        }
        Call::SetVolume(delta) => {
            let gain = surface.set_volume(delta).await?;
            Ok(json!({ "message": "volume set", "gain": gain }))
        }
        Call::PauseOrUnpause => {
            let paused = surface.pause_or_unpause().await?;
            let message = if paused { "paused" } else { "resumed" };
            Ok(json!({ "message": message, "paused": paused }))
        }
        Call::Stop => {
            let stopped = surface.stop().await?;
            let message = if stopped { "stopped" } else { "already idle" };
            Ok(json!({ "message": message, "stopped": stopped }))
        }
        Call::Status => {
            let status = surface.status().await?;
            Ok(json!({ "message": "status", "status": status }))
        }
    }
}

/// Handles one request line. Every failure becomes a fault response.
pub async fn handle_line(surface: &dyn ControlSurface, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(target: LOG_TARGET, "Malformed request: {}", e);
            return Response::fault(0, ProtocolError::Malformed(e.to_string()).to_string());
        }
    };
    let call = match Call::from_request(&request) {
        Ok(call) => call,
        Err(e) => {
            warn!(target: LOG_TARGET, request_id = request.request_id, "Rejected request: {}", e);
            return Response::fault(request.request_id, e.to_string());
        }
    };
    debug!(target: LOG_TARGET, request_id = request.request_id, ?call, "Dispatching request");
    match dispatch(surface, call).await {
        Ok(data) => Response::ok(request.request_id, data),
        Err(e) => {
            warn!(target: LOG_TARGET, request_id = request.request_id, "Request failed: {}", e);
            Response::fault(request.request_id, e.to_string())
        }
    }
}
