//! End-to-end playback scenarios against the null backends.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{av_clip, video_only_clip, TestHarness};
use parking_lot::Mutex;
use vidcore::backend::null::SourceStatus;
use vidcore::backend::{GpuResource, UploadRuntime};
use vidcore::upload::{TaskResult, UploadTask};
use vidcore::{PlayerConfig, PlayerError, PlayerState, VideoPlayer};
use vidcore_media::fixture::{AudioTrackSpec, Mp4Builder, VideoTrackSpec};

// ---------------------------------------------------------------------------
// Create / Play / Stop
// ---------------------------------------------------------------------------

#[test]
fn create_play_stop() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut player = h.player(&url);

    player.play().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert!((player.duration() - 5.0).abs() < 1e-9);
    assert!((player.frame_rate() - 30.0).abs() < 1e-6);
    assert_eq!(player.size(), (64, 48));

    // The first tick presents the frame at zero without moving the clock.
    h.tick(&mut player, 0.040);
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.time(), 0.0);
    assert!(player.frames_count() >= 1);
    assert!(player.frame_texture().is_some());

    let source = h.source(&player).expect("audio source created at open");
    assert!(source.buffers_queued_total >= 1);
    assert_eq!(source.status, SourceStatus::Playing);

    h.tick(&mut player, 0.040);
    assert!((player.time() - 0.040).abs() < 1e-9);

    player.stop();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.time(), 0.0);
    let source = h.source(&player).unwrap();
    assert_eq!(source.status, SourceStatus::Stopped);
    assert_eq!(source.queued, 0);
}

#[test]
fn begin_play_honours_start_settings() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut config = PlayerConfig::with_url(&url);
    config.play_on_start = true;
    config.start_time = 2.0;
    let mut player = h.player_with(config);

    player.begin_play().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.time(), 2.0);

    h.tick(&mut player, 0.02);
    // closest sample to 2.0 is index 60; it was presented this tick
    assert_eq!(player.cursors().video, 61);
}

#[test]
fn start_time_is_kept_until_media_opens() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut config = PlayerConfig::with_url(&url);
    config.start_time = 2.0;
    let mut player = h.player_with(config);

    player.begin_play().unwrap();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(!player.is_open());

    player.play().unwrap();
    assert!((player.time() - 2.0).abs() < 1e-9);
    h.tick(&mut player, 0.02);
    assert!((player.time() - 2.0).abs() < 1e-9);
    assert_eq!(player.cursors().video, 61);
}

// ---------------------------------------------------------------------------
// Loop wrap
// ---------------------------------------------------------------------------

#[test]
fn loop_wrap_resyncs_at_start() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut config = PlayerConfig::with_url(&url);
    config.looping = true;
    let mut player = h.player_with(config);

    player.play().unwrap();
    h.tick(&mut player, 0.020);
    player.seek(4.990);
    let resets_before = player.video_decoder_resets();

    h.tick(&mut player, 0.020);
    assert!((player.time() - 0.010).abs() < 1e-6, "time = {}", player.time());
    assert!(player.last_tick_resynced());
    assert_eq!(player.video_decoder_resets(), resets_before + 1);
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.stats().loops, 1);

    // sample 0 covers t=0.010; it was presented so the cursor moved past it
    let video = player.index().and_then(|i| i.video.as_ref()).unwrap();
    assert_eq!(video.closest(0.010), 0);
    assert_eq!(player.cursors().video, 1);
}

// ---------------------------------------------------------------------------
// Video-only media
// ---------------------------------------------------------------------------

#[test]
fn video_only_media_never_touches_audio() {
    let h = TestHarness::new();
    let url = h.write_media("silent.mp4", &video_only_clip(60));
    let mut player = h.player(&url);

    player.play().unwrap();
    // slightly longer than a frame so every tick has a due sample
    h.ticks(&mut player, 0.034, 10);

    assert!(!player.has_audio());
    assert!(player.audio_source().is_none());
    assert_eq!(h.audio.sources_created(), 0);
    assert_eq!(h.audio.buffers_created(), 0);
    assert_eq!(h.codecs.audio_decoders_created(), 0);
    assert_eq!(player.frames_count(), 10);
}

#[test]
fn zero_duration_video_plays_audio_only() {
    let h = TestHarness::new();
    let clip = Mp4Builder::new()
        .video(VideoTrackSpec::new(64, 48, 30, 0))
        .audio(AudioTrackSpec::new(48000, 2, 234));
    let url = h.write_media("audio_only.mp4", &clip);
    let mut player = h.player(&url);

    player.play().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(player.has_audio());
    assert!(player.index().is_some_and(|i| !i.has_video()));
    assert!((player.duration() - 234.0 * 1024.0 / 48000.0).abs() < 1e-6);

    h.ticks(&mut player, 0.05, 10);
    assert!((player.time() - 0.45).abs() < 1e-9);
    assert!(player.frame_texture().is_none());
    assert_eq!(player.frames_count(), 0);
    assert_eq!(h.codecs.video_decoders_created(), 0);
    assert!(h.source(&player).unwrap().buffers_queued_total >= 1);
}

// ---------------------------------------------------------------------------
// Unsupported codec
// ---------------------------------------------------------------------------

#[test]
fn unsupported_codec_leaves_player_stopped() {
    let h = TestHarness::new();
    let hevc = Mp4Builder::new().video(VideoTrackSpec::new(64, 48, 30, 30).with_codec(b"hvc1"));
    let url = h.write_media("hevc.mp4", &hevc);
    let mut player = h.player(&url);

    assert_matches!(player.play(), Err(PlayerError::UnsupportedCodec { .. }));
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(!player.is_open());
    assert_eq!(h.codecs.video_decoders_created(), 0);

    // later calls fail the same way and nothing gets created
    assert!(player.play().is_err());
    h.ticks(&mut player, 0.02, 3);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(h.gpu.textures_created(), 0);
    assert_eq!(h.audio.sources_created(), 0);
}

// ---------------------------------------------------------------------------
// Destroy during upload
// ---------------------------------------------------------------------------

/// Runtime whose tasks run later than the player expects: `cancel` arrives
/// after the task was already handed to the render thread.
#[derive(Default)]
struct LaggingRuntime {
    tasks: Mutex<Vec<Arc<UploadTask>>>,
}

impl UploadRuntime for LaggingRuntime {
    fn start(&self, task: Arc<UploadTask>) {
        self.tasks.lock().push(task);
    }

    fn cancel(&self, _task: &Arc<UploadTask>) {}

    fn has_reference(&self, resource: GpuResource) -> bool {
        self.tasks.lock().iter().any(|t| t.references(resource))
    }
}

#[test]
fn destroyed_player_task_exits_without_resources() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let runtime = Arc::new(LaggingRuntime::default());
    let mut player = VideoPlayer::new(
        PlayerConfig::with_url(&url),
        h.backends_with_uploads(runtime.clone()),
    );

    player.play().unwrap();
    player.update(&vidcore::TickContext::new(0.02));
    assert!(player.has_upload_in_flight());
    drop(player);

    let tasks: Vec<_> = runtime.tasks.lock().drain(..).collect();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].run(h.gpu.as_ref()), TaskResult::MissingResources);
    assert_eq!(h.gpu.live_textures(), 0);
    assert_eq!(h.gpu.live_buffers(), 0);
}

#[test]
fn destroy_releases_gpu_and_audio_resources() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut player = h.player(&url);

    player.play().unwrap();
    h.ticks(&mut player, 0.034, 5);
    assert!(h.gpu.live_textures() >= 1);
    assert_eq!(h.audio.live_sources(), 1);

    // leave one upload queued, then destroy
    player.update(&vidcore::TickContext::new(0.034));
    assert_eq!(h.uploads.pending(), 1);
    drop(player);

    assert_eq!(h.uploads.pending(), 0);
    assert_eq!(h.uploads.flush(h.gpu.as_ref()), 0);
    assert_eq!(h.gpu.live_textures(), 0);
    assert_eq!(h.gpu.live_buffers(), 0);
    assert_eq!(h.audio.live_sources(), 0);
    assert_eq!(h.audio.live_buffers(), 0);
}

// ---------------------------------------------------------------------------
// Seek past end
// ---------------------------------------------------------------------------

#[test]
fn seek_past_end_pauses() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut player = h.player(&url);

    player.play().unwrap();
    h.tick(&mut player, 0.02);
    player.seek(player.duration() + 10.0);
    assert_eq!(player.time(), player.duration());

    h.tick(&mut player, 0.02);
    assert_eq!(player.state(), PlayerState::Paused);
    assert_eq!(player.time(), player.duration());
    assert_eq!(h.source(&player).unwrap().status, SourceStatus::Paused);
}

#[test]
fn seek_past_end_wraps_when_looping() {
    let h = TestHarness::new();
    let url = h.write_media("clip.mp4", &av_clip());
    let mut config = PlayerConfig::with_url(&url);
    config.looping = true;
    let mut player = h.player_with(config);

    player.play().unwrap();
    h.tick(&mut player, 0.02);
    player.seek(player.duration() + 10.0);
    assert_eq!(player.time(), player.duration());

    let dt = 0.02;
    h.tick(&mut player, dt);
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(player.time() >= 0.0 && player.time() < dt + 1e-9);
    assert!(player.last_tick_resynced());
}

// ---------------------------------------------------------------------------
// Media switching
// ---------------------------------------------------------------------------

#[test]
fn set_url_switches_media() {
    let h = TestHarness::new();
    let first = h.write_media("a.mp4", &av_clip());
    let second = h.write_media("b.mp4", &video_only_clip(15));
    let mut player = h.player(&first);

    player.play().unwrap();
    h.ticks(&mut player, 1.0 / 30.0, 4);
    let frames = player.frames_count();
    assert!(player.has_audio());

    player.set_url(&second);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(!player.is_open());
    assert_eq!(h.audio.live_sources(), 0);
    assert_eq!(player.frames_count(), frames);

    player.play().unwrap();
    assert!(!player.has_audio());
    assert!((player.duration() - 0.5).abs() < 1e-9);
    h.ticks(&mut player, 1.0 / 30.0, 3);
    assert!(player.frames_count() > frames);
}
