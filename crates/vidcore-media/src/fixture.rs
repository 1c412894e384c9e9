//! Synthetic MP4 writer for tests and benchmarks.
//!
//! Produces small but structurally complete files: `ftyp`, a `moov` with
//! one AVC video track and an optional AAC audio track, and an `mdat`
//! holding placeholder sample payloads. Video payloads are real
//! length-prefixed NAL units (IDR for keyframes, non-IDR otherwise) whose
//! body starts with the big-endian sample index.

use crate::codec::AAC_SAMPLE_RATES;
use std::io;
use std::path::Path;

const SPS: [u8; 4] = [0x67, 0x64, 0x00, 0x1F];
const PPS: [u8; 2] = [0x68, 0xEE];

fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + content.len());
    out.extend_from_slice(&((8 + content.len()) as u32).to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

fn write_container(box_type: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    write_box(box_type, &children.concat())
}

fn fullbox(version: u8, flags: u32) -> [u8; 4] {
    (((version as u32) << 24) | (flags & 0x00FF_FFFF)).to_be_bytes()
}

fn write_table(box_type: &[u8; 4], entries: &[&[u32]]) -> Vec<u8> {
    let mut content = fullbox(0, 0).to_vec();
    content.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for field in entries.iter().flat_map(|e| e.iter()) {
        content.extend_from_slice(&field.to_be_bytes());
    }
    write_box(box_type, &content)
}

/// Video track parameters.
#[derive(Debug, Clone)]
pub struct VideoTrackSpec {
    pub width: u16,
    pub height: u16,
    pub timescale: u32,
    /// Per-sample decode duration in timescale units.
    pub sample_delta: u32,
    pub frames: u32,
    /// Every n-th sample is a sync sample.
    pub keyframe_interval: u32,
    /// Sample entry code; anything but `avc1`/`avc3` is unsupported.
    pub codec: [u8; 4],
    pub nal_length_size: u8,
}

impl VideoTrackSpec {
    /// `frames` AVC samples at `fps`.
    pub fn new(width: u16, height: u16, fps: u32, frames: u32) -> Self {
        Self {
            width,
            height,
            timescale: fps * 100,
            sample_delta: 100,
            frames,
            keyframe_interval: 10,
            codec: *b"avc1",
            nal_length_size: 4,
        }
    }

    pub fn with_codec(mut self, codec: &[u8; 4]) -> Self {
        self.codec = *codec;
        self
    }

    pub fn with_nal_length_size(mut self, size: u8) -> Self {
        self.nal_length_size = size;
        self
    }

    pub fn with_keyframe_interval(mut self, interval: u32) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }
}

/// Audio track parameters.
#[derive(Debug, Clone)]
pub struct AudioTrackSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Per-sample duration in sample-rate ticks.
    pub frame_length: u32,
    pub frames: u32,
    /// esds objectTypeIndication; 0x40 is MPEG-4 audio.
    pub object_indication: u8,
    /// Leave the rate out of both the sample entry and the ASC.
    pub omit_rate: bool,
}

impl AudioTrackSpec {
    /// `frames` AAC-LC access units of 1024 samples.
    pub fn new(sample_rate: u32, channels: u16, frames: u32) -> Self {
        Self {
            sample_rate,
            channels,
            frame_length: 1024,
            frames,
            object_indication: 0x40,
            omit_rate: false,
        }
    }

    pub fn with_object_indication(mut self, indication: u8) -> Self {
        self.object_indication = indication;
        self
    }

    pub fn without_rate(mut self) -> Self {
        self.omit_rate = true;
        self
    }

    fn timescale(&self) -> u32 {
        self.sample_rate.max(1)
    }
}

/// Payload written for video sample `index`: one slice NAL whose body
/// carries the index seven bits per byte with the top bit set, so no zero
/// byte (and so no start-code emulation) ever appears.
pub fn video_sample_payload(index: u32, keyframe: bool, nal_length_size: u8) -> Vec<u8> {
    let nal_type = if keyframe { 0x65 } else { 0x41 };
    let mut nal = vec![nal_type];
    nal.extend([21, 14, 7, 0].map(|shift| 0x80 | ((index >> shift) & 0x7F) as u8));
    nal.extend_from_slice(&[0xAB; 3]);

    let len = (nal.len() as u32).to_be_bytes();
    let mut out = len[4 - nal_length_size as usize..].to_vec();
    out.extend_from_slice(&nal);
    out
}

/// Payload written for audio sample `index`.
pub fn audio_sample_payload(index: u32) -> Vec<u8> {
    let mut out = vec![0x21, 0x10];
    out.extend_from_slice(&index.to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);
    out
}

/// Builder for synthetic MP4 files.
#[derive(Debug, Clone)]
pub struct Mp4Builder {
    video: Option<VideoTrackSpec>,
    audio: Option<AudioTrackSpec>,
    co64: bool,
    moov_first: bool,
}

impl Default for Mp4Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp4Builder {
    pub fn new() -> Self {
        Self {
            video: None,
            audio: None,
            co64: false,
            moov_first: true,
        }
    }

    pub fn video(mut self, spec: VideoTrackSpec) -> Self {
        self.video = Some(spec);
        self
    }

    pub fn audio(mut self, spec: AudioTrackSpec) -> Self {
        self.audio = Some(spec);
        self
    }

    /// Write 64-bit chunk offsets.
    pub fn co64(mut self, enabled: bool) -> Self {
        self.co64 = enabled;
        self
    }

    /// Place `moov` after `mdat`.
    pub fn moov_last(mut self) -> Self {
        self.moov_first = false;
        self
    }

    /// Serialize the file.
    pub fn build(&self) -> Vec<u8> {
        let mut brands = b"isom".to_vec();
        brands.extend_from_slice(&0x200u32.to_be_bytes());
        brands.extend_from_slice(b"isomavc1");
        let ftyp = write_box(b"ftyp", &brands);

        let video_payloads: Vec<Vec<u8>> = self
            .video
            .iter()
            .flat_map(|v| {
                (0..v.frames).map(move |i| {
                    video_sample_payload(i, i % v.keyframe_interval == 0, v.nal_length_size)
                })
            })
            .collect();
        let audio_payloads: Vec<Vec<u8>> = self
            .audio
            .iter()
            .flat_map(|a| (0..a.frames).map(audio_sample_payload))
            .collect();

        let mdat_body: Vec<u8> = video_payloads
            .iter()
            .chain(&audio_payloads)
            .flatten()
            .copied()
            .collect();
        let mdat = write_box(b"mdat", &mdat_body);

        // moov size does not depend on offset values, so lay it out once to
        // learn where mdat's payload lands
        let probe = self.moov(0, &video_payloads, &audio_payloads);
        let data_start = if self.moov_first {
            (ftyp.len() + probe.len() + 8) as u64
        } else {
            (ftyp.len() + 8) as u64
        };
        let moov = self.moov(data_start, &video_payloads, &audio_payloads);

        if self.moov_first {
            [ftyp, moov, mdat].concat()
        } else {
            [ftyp, mdat, moov].concat()
        }
    }

    /// Serialize to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn moov(&self, data_start: u64, video: &[Vec<u8>], audio: &[Vec<u8>]) -> Vec<u8> {
        let mut children = Vec::new();
        let mut traks = Vec::new();
        let mut longest = 0f64;
        let mut offset = data_start;

        if let Some(spec) = &self.video {
            let offsets = sample_offsets(&mut offset, video);
            longest = longest.max((spec.frames * spec.sample_delta) as f64 / spec.timescale as f64);
            traks.push(self.video_trak(spec, video, &offsets));
        }
        if let Some(spec) = &self.audio {
            let offsets = sample_offsets(&mut offset, audio);
            longest = longest.max((spec.frames * spec.frame_length) as f64 / spec.timescale() as f64);
            traks.push(self.audio_trak(spec, audio, &offsets));
        }

        children.push(write_mvhd(1000, (longest * 1000.0).round() as u64, traks.len() as u32 + 1));
        children.extend(traks);
        write_container(b"moov", &children)
    }

    fn video_trak(&self, spec: &VideoTrackSpec, payloads: &[Vec<u8>], offsets: &[u64]) -> Vec<u8> {
        let duration = (spec.frames * spec.sample_delta) as u64;

        let avcc = {
            let mut c = vec![0x01, SPS[1], SPS[2], SPS[3], 0xFC | (spec.nal_length_size - 1), 0xE1];
            c.extend_from_slice(&(SPS.len() as u16).to_be_bytes());
            c.extend_from_slice(&SPS);
            c.push(1);
            c.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
            c.extend_from_slice(&PPS);
            write_box(b"avcC", &c)
        };

        let mut entry = vec![0u8; 6];
        entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
        entry.extend_from_slice(&[0u8; 16]);
        entry.extend_from_slice(&spec.width.to_be_bytes());
        entry.extend_from_slice(&spec.height.to_be_bytes());
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        entry.extend_from_slice(&0u32.to_be_bytes());
        entry.extend_from_slice(&1u16.to_be_bytes()); // frame_count
        entry.extend_from_slice(&[0u8; 32]); // compressorname
        entry.extend_from_slice(&0x0018u16.to_be_bytes());
        entry.extend_from_slice(&(-1i16).to_be_bytes());
        entry.extend_from_slice(&avcc);

        let keyframes: Vec<[u32; 1]> = (0..spec.frames)
            .filter(|i| i % spec.keyframe_interval == 0)
            .map(|i| [i + 1])
            .collect();
        let stss = write_table(b"stss", &keyframes.iter().map(|k| k.as_slice()).collect::<Vec<_>>());

        let stbl = self.stbl(
            write_box(&spec.codec, &entry),
            spec.frames,
            spec.sample_delta,
            payloads,
            offsets,
            Some(stss),
        );

        trak(1, *b"vide", spec.timescale, duration, (spec.width, spec.height), stbl)
    }

    fn audio_trak(&self, spec: &AudioTrackSpec, payloads: &[Vec<u8>], offsets: &[u64]) -> Vec<u8> {
        let duration = (spec.frames * spec.frame_length) as u64;
        let entry_rate = if spec.omit_rate { 0 } else { spec.sample_rate };

        let mut entry = vec![0u8; 6];
        entry.extend_from_slice(&1u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 8]);
        entry.extend_from_slice(&spec.channels.to_be_bytes());
        entry.extend_from_slice(&16u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 4]);
        entry.extend_from_slice(&(entry_rate << 16).to_be_bytes());
        entry.extend_from_slice(&esds(spec));

        let stbl = self.stbl(
            write_box(b"mp4a", &entry),
            spec.frames,
            spec.frame_length,
            payloads,
            offsets,
            None,
        );

        trak(2, *b"soun", spec.timescale(), duration, (0, 0), stbl)
    }

    fn stbl(
        &self,
        sample_entry: Vec<u8>,
        count: u32,
        delta: u32,
        payloads: &[Vec<u8>],
        offsets: &[u64],
        stss: Option<Vec<u8>>,
    ) -> Vec<u8> {
        let mut stsd = fullbox(0, 0).to_vec();
        stsd.extend_from_slice(&1u32.to_be_bytes());
        stsd.extend_from_slice(&sample_entry);

        let stts: Vec<[u32; 2]> = if count > 0 { vec![[count, delta]] } else { vec![] };

        let mut stsz = fullbox(0, 0).to_vec();
        stsz.extend_from_slice(&0u32.to_be_bytes());
        stsz.extend_from_slice(&(payloads.len() as u32).to_be_bytes());
        for p in payloads {
            stsz.extend_from_slice(&(p.len() as u32).to_be_bytes());
        }

        // one sample per chunk
        let chunk_offsets = if self.co64 {
            let mut c = fullbox(0, 0).to_vec();
            c.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
            for o in offsets {
                c.extend_from_slice(&o.to_be_bytes());
            }
            write_box(b"co64", &c)
        } else {
            let entries: Vec<[u32; 1]> = offsets.iter().map(|&o| [o as u32]).collect();
            write_table(b"stco", &entries.iter().map(|e| e.as_slice()).collect::<Vec<_>>())
        };

        let mut children = vec![
            write_box(b"stsd", &stsd),
            write_table(b"stts", &stts.iter().map(|e| e.as_slice()).collect::<Vec<_>>()),
        ];
        children.extend(stss);
        children.push(write_table(b"stsc", &[&[1, 1, 1][..]]));
        children.push(write_box(b"stsz", &stsz));
        children.push(chunk_offsets);
        write_container(b"stbl", &children)
    }
}

fn sample_offsets(cursor: &mut u64, payloads: &[Vec<u8>]) -> Vec<u64> {
    payloads
        .iter()
        .map(|p| {
            let at = *cursor;
            *cursor += p.len() as u64;
            at
        })
        .collect()
}

fn write_mvhd(timescale: u32, duration: u64, next_track: u32) -> Vec<u8> {
    let mut c = fullbox(1, 0).to_vec();
    c.extend_from_slice(&[0u8; 16]); // creation + modification
    c.extend_from_slice(&timescale.to_be_bytes());
    c.extend_from_slice(&duration.to_be_bytes());
    c.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    c.extend_from_slice(&0x0100u16.to_be_bytes());
    c.extend_from_slice(&[0u8; 10]);
    c.extend_from_slice(&identity_matrix());
    c.extend_from_slice(&[0u8; 24]);
    c.extend_from_slice(&next_track.to_be_bytes());
    write_box(b"mvhd", &c)
}

fn identity_matrix() -> Vec<u8> {
    [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect()
}

fn trak(
    track_id: u32,
    handler: [u8; 4],
    timescale: u32,
    duration: u64,
    (width, height): (u16, u16),
    stbl: Vec<u8>,
) -> Vec<u8> {
    let mut tkhd = fullbox(0, 7).to_vec();
    tkhd.extend_from_slice(&[0u8; 8]);
    tkhd.extend_from_slice(&track_id.to_be_bytes());
    tkhd.extend_from_slice(&[0u8; 4]);
    tkhd.extend_from_slice(&0u32.to_be_bytes()); // duration in movie scale, unused
    tkhd.extend_from_slice(&[0u8; 16]); // reserved, layer, group, volume, reserved
    tkhd.extend_from_slice(&identity_matrix());
    tkhd.extend_from_slice(&((width as u32) << 16).to_be_bytes());
    tkhd.extend_from_slice(&((height as u32) << 16).to_be_bytes());

    let mut mdhd = fullbox(1, 0).to_vec();
    mdhd.extend_from_slice(&[0u8; 16]);
    mdhd.extend_from_slice(&timescale.to_be_bytes());
    mdhd.extend_from_slice(&duration.to_be_bytes());
    mdhd.extend_from_slice(&0x55C4u16.to_be_bytes()); // und
    mdhd.extend_from_slice(&[0u8; 2]);

    let mut hdlr = fullbox(0, 0).to_vec();
    hdlr.extend_from_slice(&[0u8; 4]);
    hdlr.extend_from_slice(&handler);
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.push(0);

    let minf = write_container(b"minf", &[stbl]);
    let mdia = write_container(
        b"mdia",
        &[write_box(b"mdhd", &mdhd), write_box(b"hdlr", &hdlr), minf],
    );
    write_container(b"trak", &[write_box(b"tkhd", &tkhd), mdia])
}

fn esds(spec: &AudioTrackSpec) -> Vec<u8> {
    let asc = audio_specific_config(spec);

    let mut dcd = vec![spec.object_indication, 0x15, 0, 0, 0];
    dcd.extend_from_slice(&128_000u32.to_be_bytes());
    dcd.extend_from_slice(&128_000u32.to_be_bytes());
    dcd.push(0x05);
    dcd.push(asc.len() as u8);
    dcd.extend_from_slice(&asc);

    let mut es = vec![0x00, 0x01, 0x00, 0x04, dcd.len() as u8];
    es.extend_from_slice(&dcd);
    es.extend_from_slice(&[0x06, 0x01, 0x02]);

    let mut content = fullbox(0, 0).to_vec();
    content.push(0x03);
    content.push(es.len() as u8);
    content.extend_from_slice(&es);
    write_box(b"esds", &content)
}

fn audio_specific_config(spec: &AudioTrackSpec) -> Vec<u8> {
    // (value, bit width) fields, packed MSB first
    let mut fields = vec![(2u32, 5u32)];
    if spec.omit_rate {
        // index 13 is reserved and decodes as an unknown rate
        fields.push((13, 4));
    } else {
        match AAC_SAMPLE_RATES.iter().position(|&r| r == spec.sample_rate) {
            Some(index) => fields.push((index as u32, 4)),
            None => {
                fields.push((15, 4));
                fields.push((spec.sample_rate, 24));
            }
        }
    }
    fields.push((spec.channels as u32, 4));

    let mut bits: u64 = 0;
    let mut used = 0u32;
    for (value, width) in fields {
        bits = (bits << width) | (value as u64 & ((1 << width) - 1));
        used += width;
    }
    let padded = used.div_ceil(8) * 8;
    bits <<= padded - used;
    (0..padded / 8)
        .rev()
        .map(|i| (bits >> (i * 8)) as u8)
        .collect()
}
