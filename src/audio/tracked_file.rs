//! File handles for track playback that are counted while open.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use symphonia::core::io::MediaSource;
use tracing::trace;

const LOG_TARGET: &str = "koalad::audio::tracked_file";

/// Hands out [`TrackedFile`]s and counts how many of them are still open.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    open: Arc<AtomicUsize>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `path` read-only. The handle is counted until it is dropped.
    pub fn open(&self, path: &Path) -> io::Result<TrackedFile> {
        let file = File::open(path)?;
        let len = file.metadata().ok().map(|m| m.len());
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(target: LOG_TARGET, path = %path.display(), now_open, "Opened track file handle");
        Ok(TrackedFile {
            file,
            len,
            open: Arc::clone(&self.open),
        })
    }

    /// Number of handles opened through this registry that are not yet closed.
    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// A read-only file whose lifetime is reflected in its [`HandleRegistry`].
#[derive(Debug)]
pub struct TrackedFile {
    file: File,
    len: Option<u64>,
    open: Arc<AtomicUsize>,
}

impl Read for TrackedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for TrackedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl MediaSource for TrackedFile {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}

impl Drop for TrackedFile {
    fn drop(&mut self) {
        let now_open = self.open.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        trace!(target: LOG_TARGET, now_open, "Closed track file handle");
    }
}
