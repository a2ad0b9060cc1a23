use crate::audio::error::AudioError;
use crate::audio::streamer::{Frame, Streamer};
use crate::audio::tracked_file::TrackedFile;
use std::io;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace, warn};

const LOG_TARGET: &str = "koalad::audio::decoder";

/// Undecodable packets in a row after which the stream is treated as corrupt.
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 16;

/// Outcome of decoding a single packet.
enum PacketOutcome {
    Frames,
    Skipped,
    ResetRequired,
    EndOfStream,
}

/// Decodes one file into stereo `f32` frames with Symphonia.
///
/// Mono input is duplicated to both channels; inputs with more than two
/// channels keep the first two.
pub struct SymphoniaStream {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pending: Vec<Frame>,
    cursor: usize,
    finished: bool,
    decode_errors: usize,
}

impl SymphoniaStream {
    /// Probes `source` using `hint` and sets up a decoder for its first playable track.
    pub fn open(source: TrackedFile, hint: &Hint) -> Result<Self, AudioError> {
        debug!(target: LOG_TARGET, "Setting up Symphonia format reader and decoder...");
        let mss = MediaSourceStream::new(Box::new(source), Default::default());
        let fmt_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe().format(
            hint,
            mss,
            &fmt_opts,
            &MetadataOptions::default(),
        )?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::UnsupportedFormat("No suitable audio track found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or(AudioError::MissingCodecParams("sample rate"))?;

        let decoder = symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;
        debug!(
            target: LOG_TARGET,
            "Symphonia decoder created: track={}, codec={:?}, rate={}",
            track_id, codec_params.codec, sample_rate
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            sample_buf: None,
            pending: Vec::new(),
            cursor: 0,
            finished: false,
            decode_errors: 0,
        })
    }

    /// Sample rate of the decoded track.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Refills `pending` with the next decoded packet. Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool, AudioError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!(target: LOG_TARGET, "End of stream reached.");
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!(target: LOG_TARGET, "Format reader requested a decoder reset.");
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                trace!(target: LOG_TARGET, "Skipping packet for track {}", packet.track_id());
                continue;
            }

            let outcome = match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        PacketOutcome::Skipped
                    } else {
                        let spec = *decoded.spec();
                        let channels = spec.channels.count().max(1);
                        let needed = decoded.capacity() * channels;
                        if self.sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                            self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                        }
                        match self.sample_buf.as_mut() {
                            Some(buf) => {
                                buf.copy_interleaved_ref(decoded);
                                self.pending.clear();
                                self.cursor = 0;
                                self.pending.extend(buf.samples().chunks(channels).map(|s| {
                                    let left = s[0];
                                    let right = if s.len() > 1 { s[1] } else { left };
                                    [left, right]
                                }));
                                PacketOutcome::Frames
                            }
                            None => PacketOutcome::Skipped,
                        }
                    }
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    self.decode_errors += 1;
                    if self.decode_errors >= MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(AudioError::DecodingError(format!(
                            "{} packets in a row failed to decode, last: {}",
                            self.decode_errors, msg
                        )));
                    }
                    warn!(target: LOG_TARGET, "Decode error, skipping packet: {}", msg);
                    PacketOutcome::Skipped
                }
                Err(SymphoniaError::ResetRequired) => PacketOutcome::ResetRequired,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    PacketOutcome::EndOfStream
                }
                Err(e) => return Err(e.into()),
            };

            match outcome {
                PacketOutcome::Frames => {
                    self.decode_errors = 0;
                    return Ok(true);
                }
                PacketOutcome::Skipped => continue,
                PacketOutcome::ResetRequired => {
                    debug!(target: LOG_TARGET, "Decoder requested a reset.");
                    self.decoder.reset();
                }
                PacketOutcome::EndOfStream => return Ok(false),
            }
        }
    }
}

impl Streamer for SymphoniaStream {
    fn stream(&mut self, out: &mut [Frame]) -> Result<usize, AudioError> {
        let mut filled = 0;
        while filled < out.len() {
            if self.cursor >= self.pending.len() {
                if self.finished || !self.decode_next()? {
                    self.finished = true;
                    break;
                }
                continue;
            }
            let n = (self.pending.len() - self.cursor).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
            self.cursor += n;
            filled += n;
        }
        Ok(filled)
    }

    fn rewind(&mut self) -> Result<(), AudioError> {
        debug!(target: LOG_TARGET, "Rewinding track {} to the start", self.track_id);
        self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: 0,
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();
        self.pending.clear();
        self.cursor = 0;
        self.finished = false;
        self.decode_errors = 0;
        Ok(())
    }
}
