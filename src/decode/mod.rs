//! Decoder drivers.
//!
//! The drivers wrap the stateful decoders handed out by a
//! [`CodecProvider`](crate::backend::CodecProvider) and take care of the
//! container-to-decoder plumbing: NAL length-prefix rewriting, codec
//! parameter prepending after a reset, and late audio format discovery.

mod audio;
mod nal;
mod video;

pub use audio::AudioDecoderDriver;
pub use nal::{length_prefixed_to_annexb, NalError};
pub use video::VideoDecoderDriver;

use crate::backend::CodecError;

/// Per-sample decode failure. The scheduler treats it as a dropped frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Malformed sample: {0}")]
    Nal(#[from] NalError),

    #[error("Failed to read sample: {0}")]
    Read(#[from] std::io::Error),
}
