//! Player-level error type.
//!
//! Component errors ([`GpuError`], [`AudioError`], [`DecodeError`],
//! [`ConvertError`]) are defined next to the component that raises them
//! and funnel into [`PlayerError`] through `#[from]`.

use crate::backend::{AudioError, GpuError, PixelFormat};
use crate::convert::ConvertError;
use crate::decode::DecodeError;
use vidcore_media::ErrorKind;

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors surfaced by [`crate::VideoPlayer`].
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Play was requested on a player without a url.
    #[error("Player has no media url")]
    EmptyUrl,

    /// The media stream could not be opened or read.
    #[error("Failed to open {url}: {source}")]
    OpenFailed {
        url: String,
        #[source]
        source: vidcore_media::Error,
    },

    /// The container was not recognised or is broken.
    #[error("Failed to parse {url}: {source}")]
    ParseFailed {
        url: String,
        #[source]
        source: vidcore_media::Error,
    },

    /// The container parsed but its video codec is not supported.
    #[error("Unsupported codec in {url}: {source}")]
    UnsupportedCodec {
        url: String,
        #[source]
        source: vidcore_media::Error,
    },

    /// A decoder could not be created or failed on a sample.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A decoded picture could not be packed for upload.
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// A GPU resource operation failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// An audio backend operation failed.
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// The staged frame format can reach the texture neither directly nor
    /// through a decode pipeline.
    #[error("Upload misconfiguration: {staged:?} frames cannot be written to a {texture:?} texture")]
    UploadMisconfiguration {
        staged: PixelFormat,
        texture: PixelFormat,
    },
}

impl PlayerError {
    /// Wrap a demuxer error according to its kind.
    pub fn from_media(url: impl Into<String>, source: vidcore_media::Error) -> Self {
        let url = url.into();
        match source.kind() {
            ErrorKind::OpenFailed => Self::OpenFailed { url, source },
            ErrorKind::ParseFailed => Self::ParseFailed { url, source },
            ErrorKind::UnsupportedCodec => Self::UnsupportedCodec { url, source },
        }
    }

    /// True for the open-time failures (`OpenFailed`, `ParseFailed`,
    /// `UnsupportedCodec`).
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. } | Self::ParseFailed { .. } | Self::UnsupportedCodec { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_from_media_kind() {
        let err = PlayerError::from_media("clip.mp4", vidcore_media::Error::unsupported("hvc1"));
        assert_matches!(err, PlayerError::UnsupportedCodec { ref url, .. } if url == "clip.mp4");
        assert!(err.is_open_failure());

        let err = PlayerError::from_media("clip.mp4", vidcore_media::Error::MissingAtom("moov"));
        assert_matches!(err, PlayerError::ParseFailed { .. });
    }

    #[test]
    fn test_display_includes_url() {
        let err = PlayerError::from_media(
            "missing.mp4",
            vidcore_media::Error::Open {
                path: "missing.mp4".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            },
        );
        assert!(err.to_string().starts_with("Failed to open missing.mp4"));
        assert!(!PlayerError::EmptyUrl.is_open_failure());
    }
}
