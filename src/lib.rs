//! Vidcore - video playback core
//!
//! Plays H.264/AAC MP4 files inside a host engine. The host supplies four
//! capability backends (GPU device, upload runtime, audio device, codec
//! provider) and calls [`VideoPlayer::update`] once per tick; the player
//! schedules samples from the Sample Index, decodes them, stages frames for
//! GPU upload and keeps a streaming audio source fed.
//!
//! The library crate also backs the `vidcore` binary's `probe`, `samples`
//! and `simulate` commands.

pub mod audio_queue;
pub mod backend;
pub mod config;
pub mod convert;
pub mod decode;
pub mod error;
pub mod player;
pub mod report;
pub mod simulate;
pub mod stats;
pub mod system;
pub mod tick;
pub mod upload;

pub use backend::Backends;
pub use config::{Config, PlaybackConfig, PlayerConfig};
pub use error::{PlayerError, Result};
pub use player::{PlayerState, VideoPlayer};
pub use stats::PlayerStats;
pub use system::{PlayerId, VideoSystem};
pub use tick::{TickContext, Transform};
pub use upload::{FramePath, QueuedUploadRuntime};
