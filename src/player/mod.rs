//! The single-track playback session.

use crate::audio::{
    lock, Completion, FileResolver, GraphError, HandleRegistry, OutputBackend, OutputDevice, RenderGraph,
    RenderGraphBuilder, SharedGraph, TrackDescriptor, TrackResolver,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace, warn};

mod error;
mod render_task;
mod state;

pub use error::PlaybackError;
pub use render_task::OnCompleteCallback;
pub use state::{PlaybackState, SessionEvent, SessionStatus, TrackInfo};

const PLAYER_LOG_TARGET: &str = "koalad::player";

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 64;

struct ActiveTrack {
    id: u64,
    descriptor: TrackDescriptor,
    graph: SharedGraph,
}

struct SessionInner {
    state: PlaybackState,
    active: Option<ActiveTrack>,
    /// Id of the start in progress while `state` is `Loading`.
    loading: Option<u64>,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    /// Serializes `start_track` calls end to end.
    start_gate: Mutex<()>,
    resolver: Box<dyn TrackResolver>,
    builder: RenderGraphBuilder,
    backend: Arc<OutputBackend>,
    next_id: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

/// Coordinates at most one active render graph with the output backend.
///
/// Cloning is cheap; every clone drives the same session.
///
/// Lock order is session, then graph or backend. The backend's init guard is
/// never taken while the session lock is held.
#[derive(Clone)]
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
}

impl PlaybackSession {
    pub fn new(resolver: Box<dyn TrackResolver>, builder: RenderGraphBuilder, backend: Arc<OutputBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    state: PlaybackState::Idle,
                    active: None,
                    loading: None,
                }),
                start_gate: Mutex::new(()),
                resolver,
                builder,
                backend,
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// A session reading tracks from disk and playing them on `device`.
    pub fn with_device(device: Box<dyn OutputDevice>) -> Self {
        let handles = HandleRegistry::new();
        Self::new(
            Box::new(FileResolver::new(handles.clone())),
            RenderGraphBuilder::new(handles),
            Arc::new(OutputBackend::new(device)),
        )
    }

    pub fn backend(&self) -> &Arc<OutputBackend> {
        &self.shared.backend
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.lock_inner().state
    }

    /// Track file handles currently open, across resolution and rendering.
    pub fn open_handles(&self) -> usize {
        self.shared.builder.handles().open_count()
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.lock_inner();
        let (track, gain, multiplier, paused) = match inner.active.as_ref() {
            Some(active) => {
                let graph = lock(&active.graph);
                (
                    Some(TrackInfo {
                        id: active.id,
                        descriptor: active.descriptor.clone(),
                    }),
                    Some(graph.gain()),
                    Some(graph.multiplier()),
                    graph.is_paused(),
                )
            }
            None => (None, None, None, false),
        };
        SessionStatus {
            state: inner.state,
            track,
            gain,
            multiplier,
            paused,
            open_handles: self.open_handles(),
            backend: self.shared.backend.format(),
        }
    }

    /// Replaces the current track with the one at `path` and starts rendering it.
    ///
    /// Returns once the render thread is spawned, not once audio is attached.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn start_track(&self, path: &Path) -> Result<TrackInfo, PlaybackError> {
        let _gate = lock(&self.shared.start_gate);
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);

        {
            let mut inner = self.lock_inner();
            self.stop_locked(&mut inner);
            inner.state = PlaybackState::Loading;
            inner.loading = Some(id);
        }
        debug!(target: PLAYER_LOG_TARGET, id, "Loading track");

        let prepared = self.prepare(id, path);

        let mut inner = self.lock_inner();
        let cancelled = inner.loading != Some(id);
        let (descriptor, graph) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                if !cancelled {
                    inner.loading = None;
                    inner.state = PlaybackState::Idle;
                }
                drop(inner);
                warn!(target: PLAYER_LOG_TARGET, id, "Failed to start track: {}", e);
                self.broadcast(SessionEvent::Error {
                    id: Some(id),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        if cancelled {
            drop(inner);
            let mut graph = graph;
            graph.release();
            info!(target: PLAYER_LOG_TARGET, id, "Track start cancelled by stop");
            return Err(PlaybackError::Interrupted);
        }

        let graph: SharedGraph = Arc::new(Mutex::new(graph));
        inner.loading = None;
        inner.state = PlaybackState::Playing;
        inner.active = Some(ActiveTrack {
            id,
            descriptor: descriptor.clone(),
            graph: Arc::clone(&graph),
        });
        drop(inner);

        if let Err(e) = self.spawn_render(id, Arc::clone(&graph)) {
            let mut inner = self.lock_inner();
            if inner.active.as_ref().map(|a| a.id) == Some(id) {
                inner.active = None;
                inner.state = PlaybackState::Idle;
            }
            lock(&graph).release();
            return Err(PlaybackError::Internal(format!("cannot spawn render thread: {}", e)));
        }

        info!(
            target: PLAYER_LOG_TARGET,
            id,
            codec = ?descriptor.codec,
            rate = descriptor.sample_rate,
            duration = ?descriptor.duration(),
            "Track started"
        );
        self.broadcast(SessionEvent::Started {
            id,
            path: descriptor.path.clone(),
        });
        Ok(TrackInfo { id, descriptor })
    }

    /// Hands `(id, graph)` to a new render thread whose completion comes back
    /// to this session.
    fn spawn_render(&self, id: u64, graph: SharedGraph) -> std::io::Result<()> {
        let session = Arc::downgrade(&self.shared);
        let on_complete: OnCompleteCallback = Box::new(move |completion| {
            if let Some(shared) = Weak::upgrade(&session) {
                PlaybackSession { shared }.on_render_complete(id, completion);
            }
        });
        render_task::spawn_render_thread(id, graph, Arc::clone(&self.shared.backend), on_complete)
    }

    /// Resolves the track, initializes the backend once and builds the graph.
    /// Runs without the session lock.
    fn prepare(&self, id: u64, path: &Path) -> Result<(TrackDescriptor, RenderGraph), PlaybackError> {
        let shown = path.display().to_string();
        let descriptor = self
            .shared
            .resolver
            .resolve(path)
            .map_err(|e| PlaybackError::ResolveFailed {
                path: shown.clone(),
                reason: e.to_string(),
            })?;

        // 1/10 second of audio per buffer.
        let buffer_frames = (descriptor.sample_rate / 10).max(1) as usize;
        let format = self
            .shared
            .backend
            .init(descriptor.sample_rate, buffer_frames)
            .map_err(|e| PlaybackError::BackendInitFailed(e.to_string()))?;

        let graph = self
            .shared
            .builder
            .build(id, &descriptor, format.sample_rate)
            .map_err(|e| match e {
                GraphError::Open(err) => PlaybackError::ResolveFailed {
                    path: shown.clone(),
                    reason: err.to_string(),
                },
                GraphError::Decode(err) => PlaybackError::DecodeFailed {
                    path: shown.clone(),
                    reason: err.to_string(),
                },
            })?;
        Ok((descriptor, graph))
    }

    /// Adds `delta` to the gain of the active track and returns the new gain.
    #[instrument(skip(self))]
    pub fn set_volume_delta(&self, delta: f64) -> Result<f64, PlaybackError> {
        let inner = self.lock_inner();
        let active = match inner.active.as_ref() {
            Some(active) if inner.state.has_track() => active,
            _ => return Err(PlaybackError::NoActiveTrack),
        };
        let gain = lock(&active.graph).adjust_gain(delta);
        let id = active.id;
        drop(inner);
        debug!(target: PLAYER_LOG_TARGET, id, gain, "Volume changed");
        self.broadcast(SessionEvent::VolumeChanged { id, gain });
        Ok(gain)
    }

    /// Flips pause on the active track and returns whether it is now paused.
    #[instrument(skip(self))]
    pub fn toggle_pause(&self) -> Result<bool, PlaybackError> {
        let mut inner = self.lock_inner();
        if !inner.state.has_track() {
            return Err(PlaybackError::NoActiveTrack);
        }
        let (id, paused) = match inner.active.as_ref() {
            Some(active) => (active.id, lock(&active.graph).toggle_pause()),
            None => return Err(PlaybackError::NoActiveTrack),
        };
        inner.state = if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        drop(inner);
        debug!(target: PLAYER_LOG_TARGET, id, paused, "Pause toggled");
        self.broadcast(if paused {
            SessionEvent::Paused { id }
        } else {
            SessionEvent::Resumed { id }
        });
        Ok(paused)
    }

    /// Stops playback and releases the track's handles before returning.
    /// Safe to call in any state; returns whether anything was stopped.
    #[instrument(skip(self))]
    pub fn stop(&self) -> bool {
        let mut inner = self.lock_inner();
        self.stop_locked(&mut inner)
    }

    /// Stops playback and shuts the output backend down.
    pub fn shutdown(&self) {
        self.stop();
        self.shared.backend.shutdown();
    }

    fn stop_locked(&self, inner: &mut SessionInner) -> bool {
        if let Some(track) = inner.active.take() {
            inner.state = PlaybackState::Stopped;
            lock(&track.graph).release();
            self.shared.backend.detach_graph(track.id);
            inner.state = PlaybackState::Idle;
            info!(target: PLAYER_LOG_TARGET, id = track.id, "Playback stopped");
            self.broadcast(SessionEvent::Stopped { id: track.id });
            return true;
        }
        if let Some(id) = inner.loading.take() {
            inner.state = PlaybackState::Idle;
            debug!(target: PLAYER_LOG_TARGET, id, "Pending track start cancelled");
            return true;
        }
        trace!(target: PLAYER_LOG_TARGET, "Stop requested while idle");
        false
    }

    /// Handles the end of a render thread. Completions for tracks that were
    /// already replaced or stopped are ignored.
    fn on_render_complete(&self, id: u64, completion: Completion) {
        let message = match completion {
            Completion::Detached => {
                trace!(target: PLAYER_LOG_TARGET, id, "Render graph detached");
                return;
            }
            Completion::Finished => None,
            Completion::Failed(message) => Some(message),
        };

        let mut inner = self.lock_inner();
        if inner.active.as_ref().map(|a| a.id) != Some(id) {
            debug!(target: PLAYER_LOG_TARGET, id, "Ignoring completion of a stale track");
            return;
        }
        if let Some(track) = inner.active.take() {
            lock(&track.graph).release();
        }
        inner.state = PlaybackState::Idle;
        drop(inner);

        match message {
            None => {
                info!(target: PLAYER_LOG_TARGET, id, "Track finished");
                self.broadcast(SessionEvent::Finished { id });
            }
            Some(message) => {
                warn!(target: PLAYER_LOG_TARGET, id, "Track stopped after a render error: {}", message);
                self.broadcast(SessionEvent::Error { id: Some(id), message });
            }
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        lock(&self.shared.inner)
    }

    /// Sends a session event; having no listeners is normal.
    fn broadcast(&self, event: SessionEvent) {
        trace!(target: PLAYER_LOG_TARGET, "Broadcasting session event: {:?}", event);
        if self.shared.events.send(event).is_err() {
            trace!(target: PLAYER_LOG_TARGET, "No active listeners for session event");
        }
    }
}
