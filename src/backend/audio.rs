//! Streaming audio backend capability.

use vidcore_media::AudioInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioBufferId(pub u32);

/// Parameters for [`AudioBackend::source_add`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDesc {
    pub info: AudioInfo,
    pub position: [f32; 3],
    /// Quaternion, xyzw.
    pub orientation: [f32; 4],
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub looping: bool,
    pub spatial: bool,
    pub attenuation: f32,
    pub min_distance: f32,
    pub doppler: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Failed to create audio source: {0}")]
    SourceCreate(String),

    #[error("Failed to create audio buffer: {0}")]
    BufferCreate(String),

    #[error("Unknown audio source {0:?}")]
    InvalidSource(SourceId),

    #[error("Unknown audio buffer {0:?}")]
    InvalidBuffer(AudioBufferId),

    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// Streaming-source audio device (OpenAL-style buffer queue).
///
/// Called only from the ticking thread of the player that owns the source.
pub trait AudioBackend: Send + Sync {
    fn source_add(&self, desc: &SourceDesc) -> Result<SourceId, AudioError>;
    fn source_play(&self, source: SourceId);
    fn source_pause(&self, source: SourceId);
    /// Stops playback; every queued buffer becomes processed.
    fn source_stop(&self, source: SourceId);
    fn source_remove(&self, source: SourceId);

    fn source_volume_changed(&self, source: SourceId, volume: f32);
    fn source_pan_changed(&self, source: SourceId, pan: f32);
    fn source_spatial_setup_changed(
        &self,
        source: SourceId,
        spatial: bool,
        attenuation: f32,
        min_distance: f32,
        doppler: f32,
    );
    fn source_transform_changed(&self, source: SourceId, position: [f32; 3], orientation: [f32; 4]);

    fn processed_buffers_count(&self, source: SourceId) -> usize;
    fn queued_buffers_count(&self, source: SourceId) -> usize;
    /// Unqueue every processed buffer.
    fn dequeue_processed_buffers(&self, source: SourceId);
    fn queue_buffer(&self, source: SourceId, buffer: AudioBufferId);

    fn buffer_create(&self) -> Result<AudioBufferId, AudioError>;
    fn buffer_delete(&self, buffer: AudioBufferId);
    fn buffer_write(
        &self,
        buffer: AudioBufferId,
        data: &[u8],
        info: &AudioInfo,
    ) -> Result<(), AudioError>;
}
