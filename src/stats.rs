//! Player diagnostics.

use serde::Serialize;

/// Counters accumulated over a player's lifetime.
///
/// `frames_uploaded` mirrors the player's `frames_count`; everything else
/// is bookkeeping of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    /// Video samples fed to the decoder.
    pub video_samples: u64,
    /// Pictures the decoder produced and were staged.
    pub frames_decoded: u64,
    /// Pictures that made it into the frame texture.
    pub frames_uploaded: u64,
    /// Video samples lost to read, decode or conversion errors.
    pub frames_dropped: u64,
    pub audio_buffers_queued: u64,
    pub audio_samples_dropped: u64,
    pub decode_errors: u64,
    pub seeks: u64,
    pub loops: u64,
}
