//! Serializable summaries of a Sample Index for the `probe` command.

use serde::Serialize;
use vidcore_media::{AudioInfo, MediaIndex, TrackIndex};

#[derive(Debug, Clone, Serialize)]
pub struct MediaReport {
    pub url: String,
    pub duration: f64,
    pub has_faststart: bool,
    pub video: VideoReport,
    pub audio: Option<AudioReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub nal_length_size: u8,
    /// `None` when the track was dropped for having no duration.
    pub track: Option<TrackReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioReport {
    pub object_type: u8,
    pub format: AudioInfo,
    pub track: TrackReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub track_id: u32,
    pub timescale: u32,
    pub duration: f64,
    pub samples: usize,
    pub keyframes: usize,
    pub bytes: u64,
}

impl TrackReport {
    fn from_track(track: &TrackIndex) -> Self {
        let samples = track.samples();
        Self {
            track_id: track.track_id,
            timescale: track.timescale,
            duration: track.duration,
            samples: samples.len(),
            keyframes: samples.iter().filter(|s| s.is_keyframe).count(),
            bytes: samples.iter().map(|s| s.size as u64).sum(),
        }
    }

    /// Average bitrate in bits per second, 0 for an empty track.
    pub fn bitrate(&self) -> u64 {
        if self.duration > 0.0 {
            (self.bytes as f64 * 8.0 / self.duration) as u64
        } else {
            0
        }
    }
}

impl MediaReport {
    pub fn new(url: impl Into<String>, index: &MediaIndex) -> Self {
        let video_info = &index.video_info;
        let audio = index
            .audio
            .as_ref()
            .zip(index.audio_info.as_ref())
            .map(|(track, info)| AudioReport {
                object_type: info.codec.object_type,
                format: info.format,
                track: TrackReport::from_track(track),
            });

        Self {
            url: url.into(),
            duration: index.duration,
            has_faststart: index.has_faststart,
            video: VideoReport {
                codec: video_info.codec.codec_string(),
                width: video_info.width,
                height: video_info.height,
                frame_rate: video_info.frame_rate,
                nal_length_size: video_info.codec.nal_length_size,
                track: index.video.as_ref().map(TrackReport::from_track),
            },
            audio,
        }
    }

    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let secs = self.duration as u64;
        out.push_str(&format!("Url: {}\n", self.url));
        out.push_str(&format!(
            "Duration: {:02}:{:02}:{:02} ({:.3}s)\n",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.duration
        ));
        out.push_str(&format!(
            "Fast start: {}\n",
            if self.has_faststart { "yes" } else { "no" }
        ));

        let v = &self.video;
        out.push_str(&format!(
            "\nVideo: {} {}x{} {:.3} fps\n",
            v.codec, v.width, v.height, v.frame_rate
        ));
        match &v.track {
            Some(track) => out.push_str(&format!(
                "  {} samples, {} keyframes, {} kb/s\n",
                track.samples,
                track.keyframes,
                track.bitrate() / 1000
            )),
            None => out.push_str("  no samples, playing audio only\n"),
        }

        match &self.audio {
            Some(a) => {
                out.push_str(&format!(
                    "\nAudio: AAC (object type {}) {} Hz {}ch\n",
                    a.object_type, a.format.sample_rate, a.format.channels
                ));
                out.push_str(&format!(
                    "  {} samples, {} kb/s\n",
                    a.track.samples,
                    a.track.bitrate() / 1000
                ));
            }
            None => out.push_str("\nAudio: none\n"),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidcore_media::fixture::{AudioTrackSpec, Mp4Builder, VideoTrackSpec};
    use vidcore_media::Demuxer;

    #[test]
    fn test_report_counts() {
        let bytes = Mp4Builder::new()
            .video(VideoTrackSpec::new(64, 48, 30, 30))
            .audio(AudioTrackSpec::new(48000, 2, 40))
            .build();
        let demuxer = Demuxer::from_reader(std::io::Cursor::new(bytes)).unwrap();
        let report = MediaReport::new("clip.mp4", demuxer.index());

        assert_eq!(report.video.width, 64);
        let track = report.video.track.as_ref().unwrap();
        assert_eq!(track.samples, 30);
        assert!(track.keyframes >= 1);
        assert!(report.audio.is_some());

        let text = report.render();
        assert!(text.contains("Video: avc1."));
        assert!(text.contains("48000 Hz 2ch"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["video"]["height"], 48);
    }
}
