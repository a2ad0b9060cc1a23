//! Per-track render graphs: decode, loop, resample, gain and pause.

use crate::audio::effects::{Gain, PauseGate};
use crate::audio::error::AudioError;
use crate::audio::format::TrackDescriptor;
use crate::audio::resampler::Resampled;
use crate::audio::streamer::{Frame, Looped, Streamer};
use crate::audio::tracked_file::HandleRegistry;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, instrument};

const LOG_TARGET: &str = "koalad::audio::graph";

/// Loudness base of the gain stage.
pub const GAIN_BASE: f64 = 2.0;

type Pipeline = PauseGate<Gain<Box<dyn Streamer>>>;

/// A render graph shared between the session and the output backend.
pub type SharedGraph = Arc<Mutex<RenderGraph>>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cannot open track: {0}")]
    Open(#[source] io::Error),
    #[error("cannot decode track: {0}")]
    Decode(#[source] AudioError),
}

/// The live pipeline of one track. Releasing it drops every stream and file
/// handle it owns; a released graph yields no more frames.
pub struct RenderGraph {
    id: u64,
    path: PathBuf,
    pipeline: Option<Pipeline>,
}

impl RenderGraph {
    /// Wraps an already assembled source in the gain and pause stages.
    pub fn new(id: u64, path: impl Into<PathBuf>, source: Box<dyn Streamer>, gain_base: f64) -> Self {
        Self {
            id,
            path: path.into(),
            pipeline: Some(PauseGate::new(Gain::new(source, gain_base))),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders the next frames. A short count means the track has ended.
    pub fn fill(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.stream(out),
            None => Ok(0),
        }
    }

    /// Adds `delta` to the gain and returns the new gain.
    pub fn adjust_gain(&mut self, delta: f64) -> f64 {
        self.pipeline
            .as_mut()
            .map_or(0.0, |p| p.inner_mut().adjust(delta))
    }

    pub fn gain(&self) -> f64 {
        self.pipeline.as_ref().map_or(0.0, |p| p.inner().gain())
    }

    /// The amplitude factor currently applied, `base^gain`.
    pub fn multiplier(&self) -> f64 {
        self.pipeline.as_ref().map_or(1.0, |p| p.inner().multiplier())
    }

    /// Flips the pause gate and returns the new paused flag.
    pub fn toggle_pause(&mut self) -> bool {
        match self.pipeline.as_mut() {
            Some(pipeline) => {
                let paused = !pipeline.is_paused();
                pipeline.set_paused(paused);
                paused
            }
            None => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pipeline.as_ref().map_or(false, |p| p.is_paused())
    }

    /// Drops the pipeline and its handles. Returns `false` if already released.
    pub fn release(&mut self) -> bool {
        match self.pipeline.take() {
            Some(pipeline) => {
                drop(pipeline);
                debug!(target: LOG_TARGET, id = self.id, "Render graph released");
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.pipeline.is_none()
    }
}

/// Assembles render graphs from track descriptors.
#[derive(Debug, Clone)]
pub struct RenderGraphBuilder {
    handles: HandleRegistry,
    loop_count: usize,
    gain_base: f64,
}

impl RenderGraphBuilder {
    pub fn new(handles: HandleRegistry) -> Self {
        Self {
            handles,
            loop_count: 1,
            gain_base: GAIN_BASE,
        }
    }

    /// How many times each track plays before it ends.
    pub fn with_loop_count(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Opens the track again and builds its pipeline, converted to `output_rate`.
    #[instrument(skip(self, descriptor), fields(path = %descriptor.path.display(), codec = ?descriptor.codec))]
    pub fn build(&self, id: u64, descriptor: &TrackDescriptor, output_rate: u32) -> Result<RenderGraph, GraphError> {
        let file = self.handles.open(&descriptor.path).map_err(GraphError::Open)?;
        let decoded = descriptor.codec.decode(file).map_err(GraphError::Decode)?;
        let source_rate = decoded.sample_rate();
        let looped = Looped::new(decoded, self.loop_count);

        let source: Box<dyn Streamer> = if source_rate != output_rate {
            info!(target: LOG_TARGET, "Resampling {} Hz -> {} Hz", source_rate, output_rate);
            Box::new(Resampled::new(looped, source_rate, output_rate).map_err(GraphError::Decode)?)
        } else {
            Box::new(looped)
        };

        debug!(target: LOG_TARGET, id, "Render graph built");
        Ok(RenderGraph::new(id, &descriptor.path, source, self.gain_base))
    }
}
