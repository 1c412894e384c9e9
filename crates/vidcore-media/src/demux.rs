//! Opening media and reading sample bytes.

use crate::index::{MediaIndex, SampleInfo};
use crate::mp4::Mp4File;
use crate::source::{ReadAt, StreamSource};
use crate::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// A parsed Sample Index bound to the stream it was parsed from.
pub struct Demuxer {
    index: MediaIndex,
    source: Box<dyn ReadAt>,
}

impl std::fmt::Debug for Demuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demuxer")
            .field("index", &self.index)
            .field("stream_len", &self.source.len())
            .finish()
    }
}

impl Demuxer {
    /// Open a local file by path or `file://` URL.
    pub fn open(url: &str) -> Result<Self> {
        let path = url_to_path(url)?;
        let file = File::open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;

        let demuxer = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            url = %url,
            duration = demuxer.index.duration,
            video_samples = demuxer.index.video.as_ref().map_or(0, |v| v.len()),
            audio_samples = demuxer.index.audio.as_ref().map_or(0, |a| a.len()),
            "Opened media"
        );
        Ok(demuxer)
    }

    /// Parse from any seekable stream and keep it for later sample reads.
    pub fn from_reader<R>(mut reader: R) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let mp4 = Mp4File::parse(&mut reader)?;
        let index = MediaIndex::from_mp4(&mp4)?;
        let source = StreamSource::new(reader)?;
        Ok(Self {
            index,
            source: Box::new(source),
        })
    }

    pub fn index(&self) -> &MediaIndex {
        &self.index
    }

    /// Fetch the compressed bytes of one sample.
    pub fn read_sample(&mut self, sample: &SampleInfo) -> io::Result<Bytes> {
        self.source.read_at(sample.offset, sample.size as usize)
    }
}

/// Resolve a player URL to a local path.
///
/// Bare paths and `file://` URLs are accepted; any other scheme is an open
/// failure.
pub fn url_to_path(url: &str) -> Result<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }

    match url.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() && !scheme.contains(['/', '\\']) => {
            Err(Error::Open {
                path: PathBuf::from(url),
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported URL scheme '{scheme}'"),
                ),
            })
        }
        _ => Ok(Path::new(url).to_path_buf()),
    }
}
