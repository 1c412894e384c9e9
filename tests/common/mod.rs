//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temp directory for synthetic MP4
//! fixtures and one set of recording null backends. Players built from the
//! harness share those backends, so tests can inspect GPU, audio and codec
//! activity after driving ticks.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use vidcore::backend::null::{NullAudio, NullCodecs, NullGpu};
use vidcore::backend::{Backends, PictureFormat, UploadRuntime};
use vidcore::{PlayerConfig, QueuedUploadRuntime, TickContext, VideoPlayer};
use vidcore_media::fixture::{AudioTrackSpec, Mp4Builder, VideoTrackSpec};

pub const WIDTH: u16 = 64;
pub const HEIGHT: u16 = 48;
pub const FPS: u32 = 30;

/// A 5.000 s clip: 150 frames at 30 fps plus 48 kHz stereo AAC that ends
/// just before the video does.
pub fn av_clip() -> Mp4Builder {
    Mp4Builder::new()
        .video(VideoTrackSpec::new(WIDTH, HEIGHT, FPS, 150))
        .audio(AudioTrackSpec::new(48000, 2, 234))
}

pub fn video_only_clip(frames: u32) -> Mp4Builder {
    Mp4Builder::new().video(VideoTrackSpec::new(WIDTH, HEIGHT, FPS, frames))
}

pub struct TestHarness {
    pub dir: TempDir,
    pub gpu: Arc<NullGpu>,
    pub uploads: Arc<QueuedUploadRuntime>,
    pub audio: Arc<NullAudio>,
    pub codecs: Arc<NullCodecs>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_codecs(NullCodecs::new(
            PictureFormat::I420,
            WIDTH as u32,
            HEIGHT as u32,
        ))
    }

    pub fn with_codecs(codecs: NullCodecs) -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            gpu: Arc::new(NullGpu::new()),
            uploads: Arc::new(QueuedUploadRuntime::new()),
            audio: Arc::new(NullAudio::new()),
            codecs: Arc::new(codecs),
        }
    }

    pub fn backends(&self) -> Backends {
        self.backends_with_uploads(self.uploads.clone())
    }

    /// Backends with a caller-supplied upload runtime.
    pub fn backends_with_uploads(&self, uploads: Arc<dyn UploadRuntime>) -> Backends {
        Backends {
            gpu: self.gpu.clone(),
            uploads,
            audio: self.audio.clone(),
            codecs: self.codecs.clone(),
        }
    }

    /// Write `builder` into the temp dir and return its path as a url.
    pub fn write_media(&self, name: &str, builder: &Mp4Builder) -> String {
        let path: PathBuf = self.dir.path().join(name);
        builder.write_to(&path).expect("failed to write fixture");
        path.to_string_lossy().into_owned()
    }

    pub fn player(&self, url: &str) -> VideoPlayer {
        self.player_with(PlayerConfig::with_url(url))
    }

    pub fn player_with(&self, config: PlayerConfig) -> VideoPlayer {
        VideoPlayer::new(config, self.backends())
    }

    /// One engine frame: tick the player, then run queued uploads the way a
    /// render thread would.
    pub fn tick(&self, player: &mut VideoPlayer, dt: f64) {
        player.update(&TickContext::new(dt));
        self.uploads.flush(self.gpu.as_ref());
    }

    pub fn ticks(&self, player: &mut VideoPlayer, dt: f64, count: usize) {
        for _ in 0..count {
            self.tick(player, dt);
        }
    }

    /// Snapshot of the player's audio source, if one exists.
    pub fn source(&self, player: &VideoPlayer) -> Option<vidcore::backend::null::SourceSnapshot> {
        player.audio_source().and_then(|id| self.audio.snapshot(id))
    }
}
