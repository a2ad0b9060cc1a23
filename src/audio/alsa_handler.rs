use crate::audio::device::{OutputDevice, OutputFormat};
use crate::audio::error::AudioError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, Frames, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use tracing::instrument;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "koalad::audio::alsa_handler";

/// Output through an ALSA PCM device.
pub struct AlsaDevice {
    device_name: String,
    pcm: Option<PCM>,
    channels: usize,
}

impl AlsaDevice {
    /// Creates a handler for the specified ALSA device. Nothing is opened yet.
    pub fn new(device_name: &str) -> Self {
        info!(target: LOG_TARGET, "Creating new AlsaDevice for device: {}", device_name);
        AlsaDevice {
            device_name: device_name.to_string(),
            pcm: None,
            channels: 2,
        }
    }

    /// Writes one chunk, recovering from an underrun. Returns the frames written.
    fn write_chunk(pcm: &PCM, samples: &[i16]) -> Result<usize, AudioError> {
        let io = pcm.io_i16()?;
        match io.writei(samples) {
            Ok(frames_written) => Ok(frames_written),
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun (EPIPE), recovering...");
                pcm.recover(libc::EPIPE, true).map_err(|recover_err| {
                    error!(target: LOG_TARGET, "ALSA recovery failed: {}", recover_err);
                    AudioError::AlsaError(format!("ALSA recovery failed: {}", recover_err))
                })?;
                Ok(0)
            }
            Err(e) => {
                error!(target: LOG_TARGET, "ALSA write error: {}", e);
                Err(AudioError::AlsaError(e.to_string()))
            }
        }
    }
}

impl OutputDevice for AlsaDevice {
    fn name(&self) -> &str {
        &self.device_name
    }

    #[instrument(skip(self, format), fields(device = %self.device_name, rate = format.sample_rate, frames = format.buffer_frames))]
    fn open(&mut self, format: OutputFormat) -> Result<u32, AudioError> {
        info!(
            target: LOG_TARGET,
            "Opening ALSA PCM device '{}': rate={}, channels={}, buffer={} frames",
            self.device_name, format.sample_rate, format.channels, format.buffer_frames
        );
        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| AudioError::InitializationError(format!("Invalid device name: {}", e)))?;
        let pcm = PCM::open(&device, Direction::Playback, false)?;

        let actual_rate = {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(format.channels as u32)?;
            hwp.set_rate_near(format.sample_rate, ValueOr::Nearest)?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != format.sample_rate {
                warn!(
                    target: LOG_TARGET,
                    "ALSA rate negotiation: requested={}, actual={}",
                    format.sample_rate, actual_rate
                );
            }
            // Two periods of the requested size make up the device buffer.
            let period = format.buffer_frames.max(1) as Frames;
            hwp.set_period_size_near(period, ValueOr::Nearest)?;
            hwp.set_buffer_size_near(period * 2)?;
            pcm.hw_params(&hwp)?;

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(buffer_size - period_size)?;
            pcm.sw_params(&swp)?;
            debug!(target: LOG_TARGET, "ALSA parameters applied (buffer={}, period={}).", buffer_size, period_size);
            actual_rate
        };

        self.pcm = Some(pcm);
        self.channels = format.channels as usize;
        info!(target: LOG_TARGET, "ALSA initialized successfully at {} Hz.", actual_rate);
        Ok(actual_rate)
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| AudioError::InvalidState("PCM not initialized for writing".to_string()))?;
        let channels = self.channels.max(1);
        let mut offset = 0;
        while offset < samples.len() {
            let frames = Self::write_chunk(pcm, &samples[offset..])?;
            offset += frames * channels;
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<(), AudioError> {
        if let Some(pcm) = &self.pcm {
            if pcm.state() == PcmState::Running {
                debug!(target: LOG_TARGET, "Dropping queued ALSA audio.");
                pcm.drop()?;
                pcm.prepare()?;
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            debug!(target: LOG_TARGET, "Closing ALSA PCM device (state: {:?})...", pcm.state());
            if pcm.state() == PcmState::Running || pcm.state() == PcmState::Prepared {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
    }
}

impl Drop for AlsaDevice {
    fn drop(&mut self) {
        debug!(target: LOG_TARGET, "Dropping AlsaDevice.");
        self.close();
    }
}
