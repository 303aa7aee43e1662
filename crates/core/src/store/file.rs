use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;

use super::AccessUnitStore;
use crate::error::StoreError;
use crate::media::StreamKind;

/// Where a stream's access units live under the store root.
///
/// Unit `n` is read from `<root>/<dir>/<prefix>_<n>.<extension>`, with `n`
/// zero-padded to at least three digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    pub dir: String,
    pub prefix: String,
    pub extension: String,
}

impl StreamLayout {
    pub fn new(dir: &str, prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.to_string(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
        }
    }

    /// `avc_raw/avc_raw_NNN.h264`
    pub fn h264() -> Self {
        Self::new("avc_raw", "avc_raw", "h264")
    }

    /// `aac_raw/aac_raw_NNN.aac`
    pub fn aac() -> Self {
        Self::new("aac_raw", "aac_raw", "aac")
    }

    fn file_name(&self, sequence: u64) -> String {
        format!("{}_{:03}.{}", self.prefix, sequence, self.extension)
    }
}

/// Access-unit store backed by one file per unit.
///
/// A missing file ends the stream. Files are opened fresh on every fetch,
/// so the store holds no per-stream position. Units are read to end of
/// file rather than to their reported length, so a file that grows while
/// it is read still overflows instead of being cut short.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    video: StreamLayout,
    audio: StreamLayout,
}

impl FileStore {
    /// Store rooted at `root` using the default H.264/AAC layouts.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            video: StreamLayout::h264(),
            audio: StreamLayout::aac(),
        }
    }

    pub fn with_layout(mut self, kind: StreamKind, layout: StreamLayout) -> Self {
        match kind {
            StreamKind::Video => self.video = layout,
            StreamKind::Audio => self.audio = layout,
        }
        self
    }

    /// Path of access unit `sequence` for `kind`.
    pub fn unit_path(&self, kind: StreamKind, sequence: u64) -> PathBuf {
        let layout = match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
        };
        self.root
            .join(&layout.dir)
            .join(layout.file_name(sequence))
    }
}

impl AccessUnitStore for FileStore {
    fn fetch(
        &self,
        kind: StreamKind,
        sequence: u64,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError> {
        let path = self.unit_path(kind, sequence);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::trace!(path = %path.display(), "access unit not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let capacity = buf.len();
        let mut reader = (&mut file).take(capacity as u64 + 1);
        let filled = fill(&mut reader, buf)?;
        if filled == capacity && fill(&mut reader, &mut [0u8; 1])? > 0 {
            let reported = file.metadata().map_or(0, |m| m.len());
            let size = usize::try_from(reported)
                .unwrap_or(usize::MAX)
                .max(capacity.saturating_add(1));
            return Err(StoreError::Overflow { size, capacity });
        }
        Ok(Some(filled))
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
