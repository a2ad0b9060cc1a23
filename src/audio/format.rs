//! Track classification and descriptor resolution.

use crate::audio::decoder::SymphoniaStream;
use crate::audio::error::AudioError;
use crate::audio::tags::TrackTags;
use crate::audio::tracked_file::{HandleRegistry, TrackedFile};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument};

const LOG_TARGET: &str = "koalad::audio::format";

/// Bytes read from the start of a file for content sniffing.
const HEADER_LEN: usize = 12;

/// Supported codecs. Adding a format means adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Wav,
    Mp3,
    Flac,
    Vorbis,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::Wav, Codec::Mp3, Codec::Flac, Codec::Vorbis];

    /// Classifies by container magic bytes.
    pub fn sniff(header: &[u8]) -> Option<Codec> {
        if header.starts_with(b"RIFF") {
            Some(Codec::Wav)
        } else if header.starts_with(b"ID3") {
            Some(Codec::Mp3)
        } else if header.starts_with(b"fLaC") {
            Some(Codec::Flac)
        } else if header.starts_with(b"OggS") {
            Some(Codec::Vorbis)
        } else if header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0 {
            // Bare MPEG audio frame sync.
            Some(Codec::Mp3)
        } else {
            None
        }
    }

    /// Classifies by file extension, ignoring case.
    pub fn from_extension(path: &Path) -> Option<Codec> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "wave" => Some(Codec::Wav),
            "mp3" => Some(Codec::Mp3),
            "flac" => Some(Codec::Flac),
            "ogg" | "oga" => Some(Codec::Vorbis),
            _ => None,
        }
    }

    /// Content signature first, extension second.
    pub fn classify(path: &Path, header: &[u8]) -> Result<Codec, AudioError> {
        if let Some(codec) = Codec::sniff(header) {
            return Ok(codec);
        }
        match Codec::from_extension(path) {
            Some(codec) => {
                debug!(target: LOG_TARGET, "No known signature in {}, using extension ({:?})", path.display(), codec);
                Ok(codec)
            }
            None => Err(AudioError::UnsupportedFormat(format!(
                "{} has no recognised signature or extension",
                path.display()
            ))),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Codec::Wav => "audio/wav",
            Codec::Mp3 => "audio/mp3",
            Codec::Flac => "audio/flac",
            Codec::Vorbis => "audio/ogg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Codec::Wav => "wav",
            Codec::Mp3 => "mp3",
            Codec::Flac => "flac",
            Codec::Vorbis => "ogg",
        }
    }

    /// Probe hint steering Symphonia towards this codec's container.
    pub fn hint(self) -> Hint {
        let mut hint = Hint::new();
        hint.with_extension(self.extension());
        hint.mime_type(self.mime());
        hint
    }

    /// Decodes `source` into a PCM stream.
    pub fn decode(self, source: TrackedFile) -> Result<SymphoniaStream, AudioError> {
        SymphoniaStream::open(source, &self.hint())
    }
}

/// Immutable identification of a playable file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDescriptor {
    pub path: PathBuf,
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "TrackTags::is_empty")]
    pub tags: TrackTags,
}

impl TrackDescriptor {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs_f64)
    }
}

/// Turns a path into a [`TrackDescriptor`].
pub trait TrackResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<TrackDescriptor, AudioError>;
}

/// Resolves descriptors from files on disk with Symphonia.
#[derive(Debug, Clone)]
pub struct FileResolver {
    handles: HandleRegistry,
}

impl FileResolver {
    pub fn new(handles: HandleRegistry) -> Self {
        Self { handles }
    }
}

impl TrackResolver for FileResolver {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn resolve(&self, path: &Path) -> Result<TrackDescriptor, AudioError> {
        let mut file = self.handles.open(path)?;
        let header = read_header(&mut file)?;
        let codec = Codec::classify(path, &header)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut probed = symphonia::default::get_probe().format(
            &codec.hint(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let (sample_rate, channels, n_frames) = {
            let track = probed
                .format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or_else(|| AudioError::UnsupportedFormat("No suitable audio track found".to_string()))?;
            let params = &track.codec_params;
            let sample_rate = params
                .sample_rate
                .ok_or(AudioError::MissingCodecParams("sample rate"))?;
            let channels = params.channels.map(|c| c.count()).unwrap_or(2);
            (sample_rate, channels, params.n_frames)
        };

        let mut tags = TrackTags::default();
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                tags.apply_revision(revision);
            }
        }
        let container_metadata = probed.format.metadata();
        if let Some(revision) = container_metadata.current() {
            tags.apply_revision(revision);
        }
        if tags.is_empty() && codec != Codec::Wav {
            debug!(target: LOG_TARGET, "No tags found in {}", path.display());
        }

        let descriptor = TrackDescriptor {
            path: path.to_path_buf(),
            codec,
            sample_rate,
            channels,
            duration_secs: n_frames.map(|frames| frames as f64 / sample_rate as f64),
            tags,
        };
        debug!(
            target: LOG_TARGET,
            codec = ?descriptor.codec,
            rate = descriptor.sample_rate,
            channels = descriptor.channels,
            "Resolved track descriptor"
        );
        Ok(descriptor)
    }
}

/// Reads up to [`HEADER_LEN`] bytes and rewinds to the start.
fn read_header(file: &mut TrackedFile) -> Result<Vec<u8>, AudioError> {
    let mut header = vec![0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    file.seek(SeekFrom::Start(0))?;
    Ok(header)
}
