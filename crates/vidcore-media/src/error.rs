//! Error types for vidcore-media.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for vidcore-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the player when surfacing open failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream could not be opened or read.
    OpenFailed,
    /// The container was not recognised or is structurally broken.
    ParseFailed,
    /// The container parsed but the video codec is not supported.
    UnsupportedCodec,
}

/// Error type for vidcore-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The media file could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error while reading the container.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required atom in MP4 file.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),

    /// The container holds no playable video track.
    #[error("No video track found")]
    NoVideoTrack,

    /// Every track present has zero duration.
    #[error("Media has zero duration")]
    EmptyMedia,

    /// Unsupported codec or URL scheme.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Codec configuration record could not be parsed.
    #[error("Invalid codec configuration: {0}")]
    InvalidCodecConfig(String),
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an invalid codec configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidCodecConfig(msg.into())
    }

    /// Classify this error for the player's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::OpenFailed,
            Error::Unsupported(_) => ErrorKind::UnsupportedCodec,
            Error::Io(_)
            | Error::InvalidMp4(_)
            | Error::MissingAtom(_)
            | Error::NoVideoTrack
            | Error::EmptyMedia
            | Error::InvalidCodecConfig(_) => ErrorKind::ParseFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let open = Error::Open {
            path: PathBuf::from("/missing.mp4"),
            source: io::Error::new(io::ErrorKind::NotFound, "nope"),
        };
        assert_eq!(open.kind(), ErrorKind::OpenFailed);
        assert_eq!(Error::unsupported("hvc1").kind(), ErrorKind::UnsupportedCodec);
        assert_eq!(Error::MissingAtom("moov").kind(), ErrorKind::ParseFailed);
        assert_eq!(Error::EmptyMedia.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_error_display() {
        let err = Error::invalid_mp4("truncated stsz");
        assert_eq!(err.to_string(), "Invalid MP4: truncated stsz");
    }
}
