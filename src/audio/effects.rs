//! Gain and pause stages applied at the end of a render graph.

use crate::audio::error::AudioError;
use crate::audio::streamer::{Frame, Streamer, SILENCE};

/// Scales the inner stream by `base^gain`.
///
/// `gain` is additive and unbounded; with base 2 every +1 doubles the amplitude.
pub struct Gain<S> {
    inner: S,
    base: f64,
    gain: f64,
}

impl<S: Streamer> Gain<S> {
    pub fn new(inner: S, base: f64) -> Self {
        Self {
            inner,
            base,
            gain: 0.0,
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Adds `delta` to the gain and returns the new value.
    pub fn adjust(&mut self, delta: f64) -> f64 {
        self.gain += delta;
        self.gain
    }

    pub fn multiplier(&self) -> f64 {
        self.base.powf(self.gain)
    }
}

impl<S: Streamer> Streamer for Gain<S> {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        let n = self.inner.stream(out)?;
        let multiplier = self.multiplier() as f32;
        if multiplier != 1.0 {
            for frame in &mut out[..n] {
                frame[0] *= multiplier;
                frame[1] *= multiplier;
            }
        }
        Ok(n)
    }
}

/// Outputs silence while paused without pulling from the inner stream,
/// so playback resumes where it stopped.
pub struct PauseGate<S> {
    inner: S,
    paused: bool,
}

impl<S: Streamer> PauseGate<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Streamer> Streamer for PauseGate<S> {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        if self.paused {
            out.fill(SILENCE);
            return Ok(out.len());
        }
        self.inner.stream(out)
    }
}
