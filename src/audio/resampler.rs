use crate::audio::error::AudioError;
use crate::audio::streamer::{Frame, Streamer, SILENCE};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, trace};

const LOG_TARGET: &str = "koalad::audio::resampler";

/// Input frames consumed per resampler pass.
const CHUNK_FRAMES: usize = 1024;
const CHANNELS: usize = 2;

/// Converts the sample rate of the inner stream with a sinc resampler.
pub struct Resampled<S> {
    inner: S,
    resampler: SincFixedIn<f32>,
    scratch: Vec<Frame>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    out_cursor: usize,
    flushed: bool,
    ratio: f64,
    /// Leading output frames that are filter delay, not signal.
    delay_remaining: usize,
    input_total: usize,
    /// Signal frames handed out or buffered so far.
    output_total: usize,
}

impl<S: Streamer> Resampled<S> {
    pub fn new(inner: S, from_rate: u32, to_rate: u32) -> Result<Self, AudioError> {
        if from_rate == 0 || to_rate == 0 {
            return Err(AudioError::ResamplingError(format!(
                "invalid rate conversion {} Hz -> {} Hz",
                from_rate, to_rate
            )));
        }
        debug!(target: LOG_TARGET, "Creating resampler: {} Hz -> {} Hz", from_rate, to_rate);
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = to_rate as f64 / from_rate as f64;
        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, CHANNELS)?;
        let delay_remaining = resampler.output_delay();
        Ok(Self {
            inner,
            resampler,
            scratch: vec![SILENCE; CHUNK_FRAMES],
            input: vec![Vec::with_capacity(CHUNK_FRAMES); CHANNELS],
            output: vec![Vec::new(); CHANNELS],
            out_cursor: 0,
            flushed: false,
            ratio,
            delay_remaining,
            input_total: 0,
            output_total: 0,
        })
    }

    fn buffered(&self) -> usize {
        self.output[0].len().saturating_sub(self.out_cursor)
    }

    /// Runs one resampler pass. Returns `false` once the tail has been flushed.
    fn refill(&mut self) -> Result<bool, AudioError> {
        if self.flushed {
            return Ok(false);
        }
        let needed = self.resampler.input_frames_next();
        if self.scratch.len() < needed {
            self.scratch.resize(needed, SILENCE);
        }
        let got = self.inner.stream(&mut self.scratch[..needed])?;
        for (ch, plane) in self.input.iter_mut().enumerate() {
            plane.clear();
            plane.extend(self.scratch[..got].iter().map(|frame| frame[ch]));
        }

        self.input_total += got;

        self.output = if got == needed {
            self.resampler.process(self.input.as_slice(), None)?
        } else {
            trace!(target: LOG_TARGET, "Inner stream ended, flushing {} frames", got);
            self.flushed = true;
            let mut tail = self.resampler.process_partial(Some(self.input.as_slice()), None)?;
            // One empty pass pushes the last real samples out of the delay line.
            let drained = self.resampler.process_partial(None::<&[Vec<f32>]>, None)?;
            for (plane, rest) in tail.iter_mut().zip(drained) {
                plane.extend(rest);
            }
            tail
        };

        let produced = self.output[0].len();
        let skip = self.delay_remaining.min(produced);
        self.delay_remaining -= skip;
        self.out_cursor = skip;
        let mut signal = produced - skip;
        if self.flushed {
            let expected = (self.input_total as f64 * self.ratio).round() as usize;
            signal = signal.min(expected.saturating_sub(self.output_total));
            for plane in self.output.iter_mut() {
                plane.truncate(skip + signal);
            }
        }
        self.output_total += signal;
        Ok(true)
    }
}

impl<S: Streamer> Streamer for Resampled<S> {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        let mut filled = 0;
        while filled < out.len() {
            let available = self.buffered();
            if available == 0 {
                if !self.refill()? {
                    break;
                }
                continue;
            }
            let n = available.min(out.len() - filled);
            let (left, right) = (&self.output[0], &self.output[1]);
            for (i, frame) in out[filled..filled + n].iter_mut().enumerate() {
                let idx = self.out_cursor + i;
                *frame = [left[idx], right[idx]];
            }
            self.out_cursor += n;
            filled += n;
        }
        Ok(filled)
    }
}
