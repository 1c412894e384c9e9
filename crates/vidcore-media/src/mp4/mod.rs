//! MP4 container parsing.
//!
//! Walks the box tree, expands each track's sample table and keeps the first
//! sample description so codec configuration can be decoded by
//! [`crate::codec`].

mod atoms;
mod reader;
mod sample_table;

pub use atoms::{Atom, AtomType, HandlerType, RawTrack, SampleDescription};
pub use reader::Mp4Reader;
pub use sample_table::{SampleEntry, SampleTable, SampleTableBuilder};

pub(crate) use reader::be_u16;

use crate::Result;
use std::io::{Read, Seek};

/// Parsed MP4 container.
#[derive(Debug, Default)]
pub struct Mp4File {
    /// `ftyp` major brand, if present.
    pub major_brand: Option<AtomType>,
    /// Movie duration in movie timescale units.
    pub duration: u64,
    pub timescale: u32,
    /// Every `trak`, in file order.
    pub tracks: Vec<RawTrack>,
    /// Whether `moov` precedes `mdat`.
    pub has_faststart: bool,
}

impl Mp4File {
    /// Parse an MP4 stream from a reader.
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Mp4Reader::new(reader)?.parse()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// First track with a `vide` handler.
    pub fn video_track(&self) -> Option<&RawTrack> {
        self.tracks.iter().find(|t| t.handler == HandlerType::Video)
    }

    /// First track with a `soun` handler.
    pub fn audio_track(&self) -> Option<&RawTrack> {
        self.tracks.iter().find(|t| t.handler == HandlerType::Audio)
    }
}
