//! Decoder capability.
//!
//! The player does not decode itself; a [`CodecProvider`] hands out stateful
//! decoders. Video decoders accept Annex-B access units, audio decoders
//! accept raw AAC access units and produce interleaved 16-bit PCM.

use vidcore_media::{AacConfig, AudioInfo, AvcConfig};

/// Layout of a decoded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureFormat {
    /// Planar 4:2:0, three planes.
    I420,
    /// Semi-planar 4:2:0, two planes.
    Nv12,
    /// Packed 4:2:2, one plane.
    Yuy2,
    Rgba8,
    Bgra8,
}

/// One image plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
}

/// A decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPicture {
    pub width: u32,
    pub height: u32,
    pub format: PictureFormat,
    pub planes: Vec<Plane>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to create decoder: {0}")]
    Create(String),

    #[error("Failed to configure decoder: {0}")]
    Configure(String),

    #[error("Decoder rejected input: {0}")]
    Decode(String),
}

/// Stateful H.264 decoder.
pub trait VideoDecoder: Send {
    /// Feed one Annex-B access unit. `Ok(None)` means the decoder is still
    /// buffering (reordering) and has no picture to emit yet.
    fn decode(&mut self, access_unit: &[u8]) -> Result<Option<DecodedPicture>, CodecError>;
}

/// Stateful AAC decoder.
pub trait AudioDecoder: Send {
    /// Prepare the decoder from an AudioSpecificConfig. Fields the config
    /// does not determine are returned as zero.
    fn configure(&mut self, config: &AacConfig) -> Result<AudioInfo, CodecError>;

    /// Decode one access unit into interleaved PCM.
    fn decode(&mut self, access_unit: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Stream parameters as observed by the decoder so far.
    fn stream_info(&self) -> AudioInfo;
}

/// Factory for decoders; shared process-wide.
pub trait CodecProvider: Send + Sync {
    /// Picture format the provider's video decoders emit.
    fn output_format(&self) -> PictureFormat;

    fn create_video_decoder(&self, config: &AvcConfig) -> Result<Box<dyn VideoDecoder>, CodecError>;

    fn create_audio_decoder(&self) -> Result<Box<dyn AudioDecoder>, CodecError>;
}
