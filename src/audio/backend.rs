//! The process-wide output backend: opened once, then mixes whichever render
//! graph is attached.

use crate::audio::device::{OutputDevice, OutputFormat};
use crate::audio::error::AudioError;
use crate::audio::graph::SharedGraph;
use crate::audio::lock;
use crate::audio::sample_converter::frames_to_s16;
use crate::audio::streamer::SILENCE;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "koalad::audio::backend";

/// Stereo output only.
const OUTPUT_CHANNELS: u16 = 2;

/// Why an attached graph stopped being mixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The graph played to the end of its stream.
    Finished,
    /// The graph was replaced, detached, or released before it played out.
    Detached,
    /// Rendering the graph failed.
    Failed(String),
}

/// The format the backend is running with after `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFormat {
    pub device: String,
    pub sample_rate: u32,
    pub buffer_frames: usize,
}

struct Attached {
    id: u64,
    graph: SharedGraph,
    done: mpsc::Sender<Completion>,
}

impl Attached {
    fn complete(self, completion: Completion) {
        trace!(target: LOG_TARGET, id = self.id, ?completion, "Signalling render completion");
        // The render thread may already be gone.
        let _ = self.done.send(completion);
    }
}

#[derive(Default)]
struct MixerSlot {
    current: Option<Attached>,
    discard_pending: bool,
}

struct BackendShared {
    /// The device until `init` hands it to the mixer thread.
    device: Mutex<Option<Box<dyn OutputDevice>>>,
    /// Init-once guard, independent of any session lock.
    format: Mutex<Option<BackendFormat>>,
    slot: Mutex<MixerSlot>,
    shutdown: AtomicBool,
    init_count: AtomicUsize,
    mixer: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the output device and mixes at most one render graph at a time.
pub struct OutputBackend {
    shared: Arc<BackendShared>,
}

impl OutputBackend {
    pub fn new(device: Box<dyn OutputDevice>) -> Self {
        info!(target: LOG_TARGET, "Creating output backend for device '{}'", device.name());
        Self {
            shared: Arc::new(BackendShared {
                device: Mutex::new(Some(device)),
                format: Mutex::new(None),
                slot: Mutex::new(MixerSlot::default()),
                shutdown: AtomicBool::new(false),
                init_count: AtomicUsize::new(0),
                mixer: Mutex::new(None),
            }),
        }
    }

    /// Opens the device and starts mixing. Runs once per backend; later calls
    /// return the running format untouched. A failed open can be retried.
    #[instrument(skip(self))]
    pub fn init(&self, sample_rate: u32, buffer_frames: usize) -> Result<BackendFormat, AudioError> {
        let mut format_guard = lock(&self.shared.format);
        if let Some(format) = format_guard.as_ref() {
            trace!(target: LOG_TARGET, "Backend already initialized at {} Hz", format.sample_rate);
            return Ok(format.clone());
        }
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(AudioError::InvalidState("output backend is shut down".to_string()));
        }

        let mut device_slot = lock(&self.shared.device);
        let device = device_slot
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("output device is no longer available".to_string()))?;
        self.shared.init_count.fetch_add(1, Ordering::SeqCst);
        let requested = OutputFormat {
            sample_rate,
            channels: OUTPUT_CHANNELS,
            buffer_frames,
        };
        let actual_rate = device.open(requested)?;
        let format = BackendFormat {
            device: device.name().to_string(),
            sample_rate: actual_rate,
            buffer_frames,
        };
        let device = device_slot
            .take()
            .ok_or_else(|| AudioError::InvalidState("output device is no longer available".to_string()))?;

        let shared = Arc::clone(&self.shared);
        let mixer_format = format.clone();
        let handle = thread::Builder::new()
            .name("koalad-mixer".to_string())
            .spawn(move || mixer_loop(shared, device, mixer_format))?;
        *lock(&self.shared.mixer) = Some(handle);

        info!(
            target: LOG_TARGET,
            "Output backend initialized: device={}, rate={}, buffer={} frames",
            format.device, format.sample_rate, format.buffer_frames
        );
        *format_guard = Some(format.clone());
        Ok(format)
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.shared.format).is_some()
    }

    pub fn format(&self) -> Option<BackendFormat> {
        lock(&self.shared.format).clone()
    }

    /// How many times the device open was attempted.
    pub fn init_count(&self) -> usize {
        self.shared.init_count.load(Ordering::SeqCst)
    }

    /// Starts mixing `graph`, replacing whatever was attached. The receiver gets
    /// exactly one [`Completion`]. A graph that was already released is never
    /// mixed and completes as detached immediately.
    pub fn attach(&self, id: u64, graph: SharedGraph) -> mpsc::Receiver<Completion> {
        let (done, completion) = mpsc::channel();
        let attached = Attached { id, graph, done };

        let mut slot = lock(&self.shared.slot);
        if lock(&attached.graph).is_released() {
            debug!(target: LOG_TARGET, id, "Refusing to attach a released graph");
            attached.complete(Completion::Detached);
            return completion;
        }
        if let Some(previous) = slot.current.replace(attached) {
            debug!(target: LOG_TARGET, replaced = previous.id, id, "Replacing attached graph");
            previous.complete(Completion::Detached);
            slot.discard_pending = true;
        } else {
            debug!(target: LOG_TARGET, id, "Graph attached");
        }
        completion
    }

    /// Silences output. Returns the id of the graph that was attached, if any.
    pub fn detach(&self) -> Option<u64> {
        let mut slot = lock(&self.shared.slot);
        let previous = slot.current.take()?;
        let id = previous.id;
        slot.discard_pending = true;
        previous.complete(Completion::Detached);
        debug!(target: LOG_TARGET, id, "Graph detached");
        Some(id)
    }

    /// Detaches only if the graph with `id` is the one being mixed.
    pub fn detach_graph(&self, id: u64) -> bool {
        let mut slot = lock(&self.shared.slot);
        if slot.current.as_ref().map(|a| a.id) != Some(id) {
            return false;
        }
        if let Some(previous) = slot.current.take() {
            slot.discard_pending = true;
            previous.complete(Completion::Detached);
            debug!(target: LOG_TARGET, id, "Graph detached");
        }
        true
    }

    /// Id of the graph currently mixed.
    pub fn attached_graph(&self) -> Option<u64> {
        lock(&self.shared.slot).current.as_ref().map(|a| a.id)
    }

    /// Detaches everything, stops the mixer thread and closes the device.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(target: LOG_TARGET, "Shutting down output backend");
        self.detach();
        let handle = lock(&self.shared.mixer).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(target: LOG_TARGET, "Mixer thread panicked");
            }
        }
    }
}

impl Drop for OutputBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn mixer_loop(shared: Arc<BackendShared>, mut device: Box<dyn OutputDevice>, format: BackendFormat) {
    debug!(target: LOG_TARGET, "Mixer thread started");
    let mut frames = vec![SILENCE; format.buffer_frames.max(1)];
    let mut samples = Vec::with_capacity(frames.len() * OUTPUT_CHANNELS as usize);
    let buffer_time = Duration::from_secs_f64(frames.len() as f64 / format.sample_rate.max(1) as f64);

    while !shared.shutdown.load(Ordering::Acquire) {
        let discard = {
            let mut slot = lock(&shared.slot);
            let discard = std::mem::take(&mut slot.discard_pending);
            let outcome = match slot.current.as_ref() {
                None => {
                    frames.fill(SILENCE);
                    None
                }
                Some(attached) => {
                    let mut graph = lock(&attached.graph);
                    if graph.is_released() {
                        frames.fill(SILENCE);
                        Some(Completion::Detached)
                    } else {
                        match graph.fill(&mut frames) {
                            Ok(n) if n == frames.len() => None,
                            Ok(n) => {
                                frames[n..].fill(SILENCE);
                                Some(Completion::Finished)
                            }
                            Err(e) => {
                                warn!(target: LOG_TARGET, id = attached.id, "Render graph failed: {}", e);
                                frames.fill(SILENCE);
                                Some(Completion::Failed(e.to_string()))
                            }
                        }
                    }
                }
            };
            if let Some(completion) = outcome {
                if let Some(attached) = slot.current.take() {
                    attached.complete(completion);
                }
            }
            discard
        };

        if discard {
            if let Err(e) = device.discard() {
                warn!(target: LOG_TARGET, "Failed to discard queued audio: {}", e);
            }
        }
        frames_to_s16(&frames, &mut samples);
        if let Err(e) = device.write(&samples) {
            error!(target: LOG_TARGET, "Output device write failed: {}", e);
            thread::sleep(buffer_time);
        }
    }

    device.close();
    debug!(target: LOG_TARGET, "Mixer thread stopped");
}
