//! Capability interfaces the player consumes.
//!
//! The core never discriminates backends by identity: a GPU device, an
//! upload runtime, an audio backend and a codec provider are injected at
//! player construction as trait objects and shared process-wide.

pub mod audio;
pub mod codec;
pub mod gpu;
pub mod null;

pub use audio::{AudioBackend, AudioBufferId, AudioError, SourceDesc, SourceId};
pub use codec::{
    AudioDecoder, CodecError, CodecProvider, DecodedPicture, PictureFormat, Plane, VideoDecoder,
};
pub use gpu::{
    BufferDesc, BufferHandle, DecodePipeline, GpuDevice, GpuError, GpuResource, PixelFormat,
    TextureDesc, TextureHandle, TextureUpdate, UploadRuntime,
};

use std::sync::Arc;

/// The set of shared backends a player is built against.
#[derive(Clone)]
pub struct Backends {
    pub gpu: Arc<dyn GpuDevice>,
    pub uploads: Arc<dyn UploadRuntime>,
    pub audio: Arc<dyn AudioBackend>,
    pub codecs: Arc<dyn CodecProvider>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
