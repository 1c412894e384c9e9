//! Box walker that turns an MP4 stream into [`Mp4File`].

use super::{Atom, AtomType, HandlerType, Mp4File, RawTrack, SampleDescription, SampleTableBuilder};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Maximum allowed box payload (64 MB) read into memory at once.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Size of the fixed part of a VisualSampleEntry after the box header.
const VISUAL_ENTRY_LEN: usize = 78;

/// Size of the fixed part of an AudioSampleEntry after the box header.
const AUDIO_ENTRY_LEN: usize = 28;

pub(crate) fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

pub(crate) fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let hi = be_u32(data, at)? as u64;
    let lo = be_u32(data, at + 4)? as u64;
    Some(hi << 32 | lo)
}

/// Iterate the fixed-width entries of a full-box table whose entry count sits
/// at `count_at`. Stops early on a truncated table.
fn table_entries(data: &[u8], count_at: usize, stride: usize) -> impl Iterator<Item = &[u8]> {
    let count = be_u32(data, count_at).unwrap_or(0) as usize;
    let start = count_at + 4;
    data.get(start..)
        .unwrap_or_default()
        .chunks_exact(stride)
        .take(count)
}

/// Walk child boxes packed inside an in-memory payload.
fn child_boxes(data: &[u8]) -> impl Iterator<Item = (AtomType, &[u8])> {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        let size = be_u32(data, pos)? as usize;
        let kind = data.get(pos + 4..pos + 8)?;
        if size < 8 || pos + size > data.len() {
            return None;
        }
        let item = (
            AtomType([kind[0], kind[1], kind[2], kind[3]]),
            &data[pos + 8..pos + size],
        );
        pos += size;
        Some(item)
    })
}

/// MP4 stream reader.
pub struct Mp4Reader<R> {
    reader: R,
    stream_len: u64,
}

impl<R: Read + Seek> Mp4Reader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, stream_len })
    }

    /// Parse the container structure and every track's sample table.
    pub fn parse(&mut self) -> Result<Mp4File> {
        let top = self.read_atoms(0, self.stream_len)?;
        if top.is_empty() {
            return Err(Error::invalid_mp4("no boxes found"));
        }

        let mut mp4 = Mp4File::default();
        let mut moov_pos = None;
        let mut mdat_pos = None;

        for atom in &top {
            match atom.atom_type {
                AtomType::FTYP => {
                    let data = self.read_atom_data(atom)?;
                    mp4.major_brand = data.get(..4).map(|b| AtomType([b[0], b[1], b[2], b[3]]));
                }
                AtomType::MOOV => {
                    moov_pos = Some(atom.data_offset);
                    self.parse_moov(atom, &mut mp4)?;
                }
                AtomType::MDAT => mdat_pos = mdat_pos.or(Some(atom.data_offset)),
                _ => {}
            }
        }

        let moov_pos = moov_pos.ok_or(Error::MissingAtom("moov"))?;
        mp4.has_faststart = mdat_pos.map_or(true, |mdat| moov_pos < mdat);

        tracing::trace!(
            tracks = mp4.tracks.len(),
            faststart = mp4.has_faststart,
            "Parsed MP4 container"
        );
        Ok(mp4)
    }

    fn read_atoms(&mut self, start: u64, end: u64) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut pos = start;

        while pos + 8 <= end {
            self.reader.seek(SeekFrom::Start(pos))?;
            let mut header = [0u8; 8];
            self.reader.read_exact(&mut header)?;

            let size = be_u32(&header, 0).unwrap_or(0) as u64;
            let atom_type = AtomType([header[4], header[5], header[6], header[7]]);

            let (size, header_size) = match size {
                1 => {
                    let mut ext = [0u8; 8];
                    self.reader.read_exact(&mut ext)?;
                    (u64::from_be_bytes(ext), 16u8)
                }
                0 => (end - pos, 8u8),
                n => (n, 8u8),
            };

            if size < header_size as u64 {
                return Err(Error::invalid_mp4(format!(
                    "box {} at {} has size {}",
                    atom_type, pos, size
                )));
            }

            atoms.push(Atom {
                atom_type,
                size,
                data_offset: pos + header_size as u64,
                header_size,
            });

            // A truncated trailing mdat is common in partial downloads
            pos = pos.saturating_add(size);
        }

        Ok(atoms)
    }

    fn read_atom_data(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        let size = atom.data_size();
        if size > MAX_ATOM_DATA_SIZE {
            return Err(Error::invalid_mp4(format!(
                "box {} data size {} exceeds maximum {}",
                atom.atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.reader.seek(SeekFrom::Start(atom.data_offset))?;
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    fn children(&mut self, parent: &Atom) -> Result<Vec<Atom>> {
        let end = parent.data_end().min(self.stream_len);
        self.read_atoms(parent.data_offset, end)
    }

    fn parse_moov(&mut self, moov: &Atom, mp4: &mut Mp4File) -> Result<()> {
        for child in self.children(moov)? {
            match child.atom_type {
                AtomType::MVHD => {
                    let data = self.read_atom_data(&child)?;
                    if let Some((timescale, duration)) = parse_header_timing(&data) {
                        mp4.timescale = timescale;
                        mp4.duration = duration;
                    }
                }
                AtomType::TRAK => {
                    let track = self.parse_trak(&child)?;
                    mp4.tracks.push(track);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_trak(&mut self, trak: &Atom) -> Result<RawTrack> {
        let mut track = RawTrack::new();

        for child in self.children(trak)? {
            match child.atom_type {
                AtomType::TKHD => {
                    let data = self.read_atom_data(&child)?;
                    // track_ID follows creation/modification times
                    let id_at = if data.first() == Some(&1) { 20 } else { 12 };
                    track.track_id = be_u32(&data, id_at).unwrap_or(0);
                }
                AtomType::MDIA => self.parse_mdia(&child, &mut track)?,
                _ => {}
            }
        }

        Ok(track)
    }

    fn parse_mdia(&mut self, mdia: &Atom, track: &mut RawTrack) -> Result<()> {
        let children = self.children(mdia)?;

        // hdlr decides how stsd is read, so resolve it before minf
        for child in children.iter().filter(|c| c.atom_type == AtomType::HDLR) {
            let data = self.read_atom_data(child)?;
            if let Some(b) = data.get(8..12) {
                track.handler = HandlerType::from_bytes([b[0], b[1], b[2], b[3]]);
            }
        }

        for child in &children {
            match child.atom_type {
                AtomType::MDHD => {
                    let data = self.read_atom_data(child)?;
                    if let Some((timescale, duration)) = parse_header_timing(&data) {
                        track.timescale = timescale;
                        track.duration = duration;
                    }
                }
                AtomType::MINF => {
                    for stbl in self.children(child)? {
                        if stbl.atom_type == AtomType::STBL {
                            self.parse_stbl(&stbl, track)?;
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn parse_stbl(&mut self, stbl: &Atom, track: &mut RawTrack) -> Result<()> {
        let mut builder = SampleTableBuilder::new();

        for child in self.children(stbl)? {
            let kind = child.atom_type;
            if !matches!(
                kind,
                AtomType::STSD
                    | AtomType::STTS
                    | AtomType::STSS
                    | AtomType::STSC
                    | AtomType::STSZ
                    | AtomType::STCO
                    | AtomType::CO64
                    | AtomType::CTTS
            ) {
                continue;
            }

            let data = self.read_atom_data(&child)?;
            match kind {
                AtomType::STSD => track.description = parse_stsd(&data, track.handler),
                AtomType::STTS => builder.set_stts(
                    table_entries(&data, 4, 8)
                        .filter_map(|e| Some((be_u32(e, 0)?, be_u32(e, 4)?)))
                        .collect(),
                ),
                AtomType::STSS => builder.set_sync_samples(
                    table_entries(&data, 4, 4)
                        .filter_map(|e| be_u32(e, 0))
                        .collect(),
                ),
                AtomType::STSC => builder.set_stsc(
                    table_entries(&data, 4, 12)
                        .filter_map(|e| Some((be_u32(e, 0)?, be_u32(e, 4)?, be_u32(e, 8)?)))
                        .collect(),
                ),
                AtomType::STSZ => {
                    let uniform = be_u32(&data, 4).unwrap_or(0);
                    let count = be_u32(&data, 8).unwrap_or(0);
                    let sizes = if uniform == 0 {
                        table_entries(&data, 8, 4)
                            .filter_map(|e| be_u32(e, 0))
                            .collect()
                    } else {
                        Vec::new()
                    };
                    builder.set_stsz(uniform, count, sizes);
                }
                AtomType::STCO => builder.set_chunk_offsets(
                    table_entries(&data, 4, 4)
                        .filter_map(|e| be_u32(e, 0).map(u64::from))
                        .collect(),
                ),
                AtomType::CO64 => builder.set_chunk_offsets(
                    table_entries(&data, 4, 8)
                        .filter_map(|e| be_u64(e, 0))
                        .collect(),
                ),
                // version 0 is nominally unsigned but encoders write
                // negative offsets there too, so both read as i32
                AtomType::CTTS => builder.set_ctts(
                    table_entries(&data, 4, 8)
                        .filter_map(|e| Some((be_u32(e, 0)?, be_u32(e, 4)? as i32)))
                        .collect(),
                ),
                _ => {}
            }
        }

        track.sample_table = builder.build()?;
        Ok(())
    }
}

/// Timescale and duration from an `mvhd` or `mdhd` payload.
fn parse_header_timing(data: &[u8]) -> Option<(u32, u64)> {
    match data.first()? {
        0 => Some((be_u32(data, 12)?, be_u32(data, 16)? as u64)),
        _ => Some((be_u32(data, 20)?, be_u64(data, 24)?)),
    }
}

/// Read the first sample entry of an `stsd` payload.
fn parse_stsd(data: &[u8], handler: HandlerType) -> SampleDescription {
    let mut desc = SampleDescription::default();

    // version/flags (4) + entry_count (4), then the first entry box
    let Some((format, entry)) = data.get(8..).and_then(|d| child_boxes(d).next()) else {
        return desc;
    };
    desc.format = Some(format);

    let boxes_at = match handler {
        HandlerType::Video => {
            // reserved(6) data_ref(2) predefined/reserved(16) width(2) height(2)
            desc.width = be_u16(entry, 24).unwrap_or(0) as u32;
            desc.height = be_u16(entry, 26).unwrap_or(0) as u32;
            VISUAL_ENTRY_LEN
        }
        HandlerType::Audio => {
            // reserved(6) data_ref(2) version(2) revision(2) vendor(4)
            // channels(2) sample_size(2) compression(2) packet(2) rate(16.16)
            desc.channels = be_u16(entry, 16).unwrap_or(0);
            desc.sample_size = be_u16(entry, 18).unwrap_or(0);
            desc.sample_rate = be_u32(entry, 24).unwrap_or(0) >> 16;
            AUDIO_ENTRY_LEN
        }
        HandlerType::Other(_) => return desc,
    };

    desc.config = entry
        .get(boxes_at..)
        .and_then(|rest| {
            child_boxes(rest).find(|(kind, _)| *kind == AtomType::AVCC || *kind == AtomType::ESDS)
        })
        .map(|(_, payload)| payload.to_vec());

    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_helpers_bounds() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(be_u16(&data, 6), Some(0x0607));
        assert_eq!(be_u16(&data, 7), None);
        assert_eq!(be_u32(&data, 4), Some(0x04050607));
        assert_eq!(be_u64(&data, 0), Some(0x0001020304050607));
        assert_eq!(be_u64(&data, 1), None);
    }

    #[test]
    fn test_table_entries_truncated() {
        // claims three entries, carries two
        let data = [0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 2];
        let values: Vec<u32> = table_entries(&data, 4, 4)
            .filter_map(|e| be_u32(e, 0))
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_header_timing_versions() {
        let mut v0 = vec![0u8; 20];
        v0[12..16].copy_from_slice(&90_000u32.to_be_bytes());
        v0[16..20].copy_from_slice(&180_000u32.to_be_bytes());
        assert_eq!(parse_header_timing(&v0), Some((90_000, 180_000)));

        let mut v1 = vec![0u8; 32];
        v1[0] = 1;
        v1[20..24].copy_from_slice(&1000u32.to_be_bytes());
        v1[24..32].copy_from_slice(&(u32::MAX as u64 + 5).to_be_bytes());
        assert_eq!(parse_header_timing(&v1), Some((1000, u32::MAX as u64 + 5)));

        assert_eq!(parse_header_timing(&[]), None);
    }

    #[test]
    fn test_undersized_box_rejected() {
        let data = vec![0u8, 0, 0, 4, b'f', b'r', b'e', b'e'];
        let mut reader = Mp4Reader::new(std::io::Cursor::new(data)).unwrap();
        assert!(matches!(reader.parse(), Err(Error::InvalidMp4(_))));
    }
}
