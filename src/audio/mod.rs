//! Audio resolution, render graphs and the output backend

mod alsa_handler;
pub mod backend;
mod decoder;
pub mod device;
mod effects;
pub mod error;
pub mod format;
pub mod graph;
mod resampler;
mod sample_converter;
pub mod streamer;
mod tags;
mod tracked_file;

pub use alsa_handler::AlsaDevice;
pub use backend::{BackendFormat, Completion, OutputBackend};
pub use decoder::SymphoniaStream;
pub use device::{NullDevice, OutputDevice, OutputFormat};
pub use effects::{Gain, PauseGate};
pub use error::AudioError;
pub use format::{Codec, FileResolver, TrackDescriptor, TrackResolver};
pub use graph::{GraphError, RenderGraph, RenderGraphBuilder, SharedGraph, GAIN_BASE};
pub use resampler::Resampled;
pub use sample_converter::{f32_to_s16, frames_to_s16};
pub use streamer::{Frame, Looped, Streamer, SILENCE};
pub use tags::TrackTags;
pub use tracked_file::{HandleRegistry, TrackedFile};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, carrying on with the inner value if a holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
