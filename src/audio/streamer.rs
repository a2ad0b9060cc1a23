//! Pull-based PCM streams that make up a render graph.

use crate::audio::error::AudioError;

/// One stereo frame of `f32` samples in `[-1.0, 1.0]`.
pub type Frame = [f32; 2];

pub const SILENCE: Frame = [0.0; 2];

/// A source of stereo frames.
///
/// `stream` fills `out` from the front and returns the number of frames written.
/// Returning fewer than `out.len()` frames means the stream is exhausted; every
/// later call returns `Ok(0)`.
pub trait Streamer: Send {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError>;

    /// Restarts the stream from its first frame.
    fn rewind(&mut self) -> Result<(), AudioError> {
        Err(AudioError::UnsupportedOperation(
            "stream cannot be rewound".to_string(),
        ))
    }
}

impl<S: Streamer + ?Sized> Streamer for Box<S> {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        (**self).stream(out)
    }

    fn rewind(&mut self) -> Result<(), AudioError> {
        (**self).rewind()
    }
}

/// Plays the inner stream `times` times in a row, then ends.
pub struct Looped<S> {
    inner: S,
    remaining: usize,
}

impl<S: Streamer> Looped<S> {
    pub fn new(inner: S, times: usize) -> Self {
        Self {
            inner,
            remaining: times,
        }
    }

    /// Playthroughs left, counting the one in progress.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S: Streamer> Streamer for Looped<S> {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        let mut filled = 0;
        while filled < out.len() && self.remaining > 0 {
            filled += self.inner.stream(&mut out[filled..])?;
            if filled < out.len() {
                self.remaining -= 1;
                if self.remaining > 0 {
                    self.inner.rewind()?;
                }
            }
        }
        Ok(filled)
    }
}
