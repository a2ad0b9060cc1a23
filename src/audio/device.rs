//! Output devices the backend writes rendered audio to.

use crate::audio::error::AudioError;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const LOG_TARGET: &str = "koalad::audio::device";

/// Format requested when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per buffer handed to `write`.
    pub buffer_frames: usize,
}

/// A sink for interleaved S16 audio.
pub trait OutputDevice: Send {
    fn name(&self) -> &str;

    /// Opens the device and returns the sample rate it actually runs at.
    fn open(&mut self, format: OutputFormat) -> Result<u32, AudioError>;

    /// Writes interleaved samples, blocking until the device accepted them.
    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    /// Drops audio queued in the device, after a graph was detached.
    fn discard(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn close(&mut self);
}

/// Accepts audio and throws it away at real-time pace.
#[derive(Debug, Default)]
pub struct NullDevice {
    format: Option<OutputFormat>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDevice for NullDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&mut self, format: OutputFormat) -> Result<u32, AudioError> {
        info!(target: LOG_TARGET, "Opening null output at {} Hz", format.sample_rate);
        self.format = Some(format);
        Ok(format.sample_rate)
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        let format = self
            .format
            .ok_or_else(|| AudioError::InvalidState("null output not opened".to_string()))?;
        let frames = samples.len() / format.channels.max(1) as usize;
        thread::sleep(Duration::from_secs_f64(frames as f64 / format.sample_rate as f64));
        Ok(())
    }

    fn close(&mut self) {
        debug!(target: LOG_TARGET, "Closing null output");
        self.format = None;
    }
}
