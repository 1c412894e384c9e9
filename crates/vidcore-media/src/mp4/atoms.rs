//! MP4 box identifiers and per-track parse results.

use super::SampleTable;

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const EDTS: Self = Self(*b"edts");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");
    pub const AVCC: Self = Self(*b"avcC");
    pub const ESDS: Self = Self(*b"esds");

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed box header.
#[derive(Debug, Clone)]
pub struct Atom {
    pub atom_type: AtomType,
    /// Box size including header.
    pub size: u64,
    /// Stream offset where the payload starts.
    pub data_offset: u64,
    /// 8, or 16 for boxes with a 64-bit size field.
    pub header_size: u8,
}

impl Atom {
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }

    pub fn data_end(&self) -> u64 {
        self.data_offset + self.data_size()
    }
}

/// Handler type from `hdlr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Other([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            _ => Self::Other(bytes),
        }
    }
}

/// First sample description of a track's `stsd`.
#[derive(Debug, Clone, Default)]
pub struct SampleDescription {
    /// Sample entry code (`avc1`, `mp4a`, `hvc1`, ...).
    pub format: Option<AtomType>,
    /// Payload of the codec configuration child box (`avcC` or `esds`).
    pub config: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub channels: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
}

/// Everything the reader learns about one `trak`.
#[derive(Debug, Clone)]
pub struct RawTrack {
    pub track_id: u32,
    pub handler: HandlerType,
    /// Duration in media timescale units.
    pub duration: u64,
    pub timescale: u32,
    pub description: SampleDescription,
    pub sample_table: SampleTable,
}

impl RawTrack {
    pub fn new() -> Self {
        Self {
            track_id: 0,
            handler: HandlerType::Other([0; 4]),
            duration: 0,
            timescale: 0,
            description: SampleDescription::default(),
            sample_table: SampleTable::default(),
        }
    }

    /// Track duration in seconds; falls back to the sample table extent when
    /// `mdhd` carries no duration.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        let ticks = if self.duration > 0 {
            self.duration
        } else {
            self.sample_table.end_dts()
        };
        ticks as f64 / self.timescale as f64
    }
}

impl Default for RawTrack {
    fn default() -> Self {
        Self::new()
    }
}
