//! Sample Index: per-track sample lists with timing in seconds.
//!
//! Built once from a parsed [`Mp4File`]; nothing here touches the stream
//! again. Sample bytes are fetched later through [`crate::ReadAt`] using
//! the offsets recorded in each [`SampleInfo`].

use crate::codec::{AacConfig, AvcConfig};
use crate::mp4::{AtomType, Mp4File, RawTrack};
use crate::{Error, Result};

/// Track category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum TrackKind {
    Video,
    Audio,
}

/// One compressed sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SampleInfo {
    pub index: u32,
    /// Absolute byte offset in the source stream.
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in seconds; non-decreasing in index order.
    pub timestamp: f64,
    /// Seconds.
    pub duration: f64,
    /// Presentation timestamp in seconds.
    pub pts: f64,
    pub is_keyframe: bool,
}

/// All samples of one track.
#[derive(Debug, Clone)]
pub struct TrackIndex {
    pub kind: TrackKind,
    pub track_id: u32,
    pub timescale: u32,
    /// Track duration in seconds.
    pub duration: f64,
    samples: Vec<SampleInfo>,
}

impl TrackIndex {
    pub fn new(kind: TrackKind, track_id: u32, timescale: u32, samples: Vec<SampleInfo>) -> Self {
        let duration = samples
            .last()
            .map_or(0.0, |s| s.timestamp + s.duration);
        Self {
            kind,
            track_id,
            timescale,
            duration,
            samples,
        }
    }

    fn from_raw(kind: TrackKind, raw: &RawTrack) -> Self {
        let scale = raw.timescale.max(1) as f64;
        let samples = raw
            .sample_table
            .samples
            .iter()
            .map(|s| SampleInfo {
                index: s.index,
                offset: s.offset,
                size: s.size,
                timestamp: s.dts as f64 / scale,
                duration: s.duration as f64 / scale,
                pts: s.pts() as f64 / scale,
                is_keyframe: s.is_keyframe,
            })
            .collect();

        let mut track = Self::new(kind, raw.track_id, raw.timescale, samples);
        track.duration = track.duration.max(raw.duration_secs());
        track
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SampleInfo> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    /// Index of the sample whose timestamp is nearest to `time`.
    ///
    /// Ties go to the earlier sample; runs of equal timestamps resolve to
    /// the lowest index. Returns 0 for an empty track.
    pub fn closest(&self, time: f64) -> usize {
        let after = self.samples.partition_point(|s| s.timestamp <= time);
        let chosen = match after {
            0 => 0,
            n if n == self.samples.len() => n - 1,
            n => {
                let before = time - self.samples[n - 1].timestamp;
                let next = self.samples[n].timestamp - time;
                if next < before {
                    n
                } else {
                    n - 1
                }
            }
        };

        match self.samples.get(chosen) {
            Some(hit) => self.samples.partition_point(|s| s.timestamp < hit.timestamp),
            None => 0,
        }
    }

    /// Last sample with `timestamp <= time`.
    pub fn sample_at_or_before(&self, time: f64) -> Option<usize> {
        self.samples
            .partition_point(|s| s.timestamp <= time)
            .checked_sub(1)
    }

    /// Nearest keyframe at or before `index`.
    pub fn keyframe_at_or_before(&self, index: usize) -> Option<usize> {
        let last = index.min(self.samples.len().checked_sub(1)?);
        (0..=last).rev().find(|&i| self.samples[i].is_keyframe)
    }
}

/// PCM layout of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioInfo {
    /// True once every field carries a usable value.
    pub fn is_complete(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0 && self.bits_per_sample > 0
    }

    /// Fill zero fields from `other`, leaving known values untouched.
    pub fn merge(&self, other: &AudioInfo) -> AudioInfo {
        AudioInfo {
            sample_rate: if self.sample_rate > 0 { self.sample_rate } else { other.sample_rate },
            channels: if self.channels > 0 { self.channels } else { other.channels },
            bits_per_sample: if self.bits_per_sample > 0 {
                self.bits_per_sample
            } else {
                other.bits_per_sample
            },
        }
    }

    /// Bytes per second of interleaved PCM.
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * (self.bits_per_sample as u64 / 8)
    }
}

/// Video attributes captured at open.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Average frames per second over the track.
    pub frame_rate: f64,
    pub codec: AvcConfig,
}

/// Audio attributes captured at open.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AudioTrackInfo {
    pub codec: AacConfig,
    /// Container-level format; fields may be zero until the first decode.
    pub format: AudioInfo,
}

/// The Sample Index of one media file.
#[derive(Debug, Clone)]
pub struct MediaIndex {
    /// `None` when the video track has no duration and audio carries the
    /// media alone.
    pub video: Option<TrackIndex>,
    pub video_info: VideoInfo,
    pub audio: Option<TrackIndex>,
    pub audio_info: Option<AudioTrackInfo>,
    /// Longest present track, in seconds.
    pub duration: f64,
    pub has_faststart: bool,
}

impl MediaIndex {
    /// Build the index from a parsed container.
    pub fn from_mp4(mp4: &Mp4File) -> Result<Self> {
        let raw_video = mp4.video_track().ok_or(Error::NoVideoTrack)?;
        let video_info = video_info(raw_video)?;
        let video = Some(TrackIndex::from_raw(TrackKind::Video, raw_video)).filter(|track| {
            let playable = !track.is_empty() && track.duration > 0.0;
            if !playable {
                tracing::warn!(track_id = track.track_id, "Dropping zero-duration video track");
            }
            playable
        });

        let audio = mp4.audio_track().and_then(|raw| match audio_info(raw) {
            Ok(info) => Some((
                TrackIndex::from_raw(TrackKind::Audio, raw),
                info,
            )),
            Err(e) => {
                tracing::warn!(track_id = raw.track_id, error = %e, "Skipping audio track");
                None
            }
        });

        let audio = audio.filter(|(track, _)| {
            let playable = !track.is_empty() && track.duration > 0.0;
            if !playable {
                tracing::warn!(track_id = track.track_id, "Dropping zero-duration audio track");
            }
            playable
        });

        let duration = match (&video, &audio) {
            (Some(v), Some((a, _))) => v.duration.max(a.duration),
            (Some(v), None) => v.duration,
            (None, Some((a, _))) => a.duration,
            (None, None) => return Err(Error::EmptyMedia),
        };

        let frame_rate = video
            .as_ref()
            .map_or(0.0, |v| v.len() as f64 / v.duration);
        let (audio, audio_info) = match audio {
            Some((track, info)) => (Some(track), Some(info)),
            None => (None, None),
        };

        Ok(Self {
            video,
            video_info: VideoInfo {
                frame_rate,
                ..video_info
            },
            audio,
            audio_info,
            duration,
            has_faststart: mp4.has_faststart,
        })
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn width(&self) -> u32 {
        self.video_info.width
    }

    pub fn height(&self) -> u32 {
        self.video_info.height
    }

    pub fn frame_rate(&self) -> f64 {
        self.video_info.frame_rate
    }

    /// Annex-B SPS/PPS blob for the video decoder.
    pub fn codec_params(&self) -> Vec<u8> {
        self.video_info.codec.annexb_headers()
    }
}

fn video_info(raw: &RawTrack) -> Result<VideoInfo> {
    let desc = &raw.description;
    match desc.format {
        Some(AtomType(f)) if &f == b"avc1" || &f == b"avc3" => {}
        Some(other) => {
            return Err(Error::unsupported(format!("video sample entry {other}")));
        }
        None => return Err(Error::MissingAtom("stsd")),
    }

    let config = desc.config.as_deref().ok_or(Error::MissingAtom("avcC"))?;
    Ok(VideoInfo {
        width: desc.width,
        height: desc.height,
        frame_rate: 0.0,
        codec: AvcConfig::parse(config)?,
    })
}

fn audio_info(raw: &RawTrack) -> Result<AudioTrackInfo> {
    let desc = &raw.description;
    match desc.format {
        Some(AtomType(f)) if &f == b"mp4a" => {}
        Some(other) => {
            return Err(Error::unsupported(format!("audio sample entry {other}")));
        }
        None => return Err(Error::MissingAtom("stsd")),
    }

    let esds = desc.config.as_deref().ok_or(Error::MissingAtom("esds"))?;
    let codec = AacConfig::from_esds(esds)?;

    // ASC values win over the sample entry, which is often 2ch/16bit boilerplate
    let format = AudioInfo {
        sample_rate: if codec.sample_rate > 0 { codec.sample_rate } else { desc.sample_rate },
        channels: if codec.channels > 0 { codec.channels as u16 } else { desc.channels },
        bits_per_sample: 16,
    };

    Ok(AudioTrackInfo { codec, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(timestamps: &[f64]) -> TrackIndex {
        let samples = timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| SampleInfo {
                index: i as u32,
                offset: 0,
                size: 1,
                timestamp: t,
                duration: 0.1,
                pts: t,
                is_keyframe: i % 3 == 0,
            })
            .collect();
        TrackIndex::new(TrackKind::Video, 1, 1000, samples)
    }

    #[test]
    fn test_closest_prefers_nearest() {
        let t = track(&[0.0, 0.1, 0.2, 0.3]);
        assert_eq!(t.closest(0.0), 0);
        assert_eq!(t.closest(0.12), 1);
        assert_eq!(t.closest(0.18), 2);
        assert_eq!(t.closest(-1.0), 0);
        assert_eq!(t.closest(99.0), 3);
    }

    #[test]
    fn test_closest_tie_goes_earlier() {
        let t = track(&[0.0, 1.0, 2.0]);
        assert_eq!(t.closest(0.5), 0);
        assert_eq!(t.closest(1.5), 1);
    }

    #[test]
    fn test_closest_equal_timestamps_lowest_index() {
        let t = track(&[0.0, 0.5, 0.5, 0.5, 1.0]);
        assert_eq!(t.closest(0.5), 1);
        assert_eq!(t.closest(0.6), 1);
    }

    #[test]
    fn test_closest_empty_track() {
        assert_eq!(track(&[]).closest(3.0), 0);
    }

    #[test]
    fn test_at_or_before_lookups() {
        let t = track(&[0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(t.sample_at_or_before(0.25), Some(2));
        assert_eq!(t.sample_at_or_before(-0.1), None);
        assert_eq!(t.keyframe_at_or_before(2), Some(0));
        assert_eq!(t.keyframe_at_or_before(4), Some(3));
        assert_eq!(t.keyframe_at_or_before(100), Some(3));
    }

    #[test]
    fn test_track_duration_from_samples() {
        let t = track(&[0.0, 0.1, 0.2]);
        assert!((t.duration - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_audio_info_merge() {
        let partial = AudioInfo {
            sample_rate: 0,
            channels: 2,
            bits_per_sample: 16,
        };
        let decoded = AudioInfo {
            sample_rate: 44100,
            channels: 6,
            bits_per_sample: 32,
        };
        let merged = partial.merge(&decoded);
        assert_eq!(merged.sample_rate, 44100);
        assert_eq!(merged.channels, 2);
        assert_eq!(merged.bits_per_sample, 16);
        assert!(merged.is_complete());
        assert_eq!(merged.byte_rate(), 44100 * 4);
    }
}
