//! Vidcore-Media: MP4 demuxing for the vidcore playback core
//!
//! This crate builds the Sample Index a player schedules against. A media
//! file is parsed exactly once; afterwards every sample is fetched with a
//! positioned read against the stream that was opened.
//!
//! # Modules
//!
//! - `mp4` - MP4 box walking and sample table expansion
//! - `codec` - avcC and esds/AudioSpecificConfig records
//! - `index` - per-track sample lists with timing in seconds
//! - `source` - positioned reads ([`ReadAt`])
//! - `demux` - [`Demuxer`], the index bound to its stream
//! - `fixture` - synthetic MP4 writer (feature `fixture`)
//!
//! # Supported input
//!
//! Progressive (non-fragmented) MP4 with one H.264 video track (`avc1` or
//! `avc3`) and optionally one AAC audio track (`mp4a`). Other audio codecs
//! are skipped with a warning; any other video codec fails the open.

pub mod codec;
pub mod demux;
pub mod error;
pub mod index;
pub mod mp4;
pub mod source;

#[cfg(feature = "fixture")]
pub mod fixture;

pub use codec::{AacConfig, AvcConfig};
pub use demux::Demuxer;
pub use error::{Error, ErrorKind, Result};
pub use index::{AudioInfo, AudioTrackInfo, MediaIndex, SampleInfo, TrackIndex, TrackKind, VideoInfo};
pub use mp4::Mp4File;
pub use source::{ReadAt, StreamSource};
