//! The video player.
//!
//! [`VideoPlayer`] owns everything one piece of media needs: the sample
//! index and its byte stream, both decoder drivers, the upload state and
//! the audio queue. It is driven by [`VideoPlayer::update`] once per
//! engine tick; see the `scheduler` module for the per-tick algorithm.

mod clock;
mod scheduler;

pub use clock::{Cursors, EndOfMedia, PlaybackClock};

use crate::audio_queue::AudioQueue;
use crate::backend::{Backends, GpuResource, SourceDesc, SourceId, TextureHandle};
use crate::config::{clamp_or, PlayerConfig};
use crate::decode::{AudioDecoderDriver, VideoDecoderDriver};
use crate::error::{PlayerError, Result};
use crate::stats::PlayerStats;
use crate::tick::Transform;
use crate::upload::{FramePath, UploadShared};
use serde::Serialize;
use std::sync::Arc;
use vidcore_media::{AudioInfo, AudioTrackInfo, Demuxer, MediaIndex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

struct AudioTrack {
    decoder: AudioDecoderDriver,
    queue: AudioQueue,
}

/// Everything created when media is opened.
struct Media {
    demuxer: Demuxer,
    /// Absent when the video track was dropped at open.
    video: Option<VideoDecoderDriver>,
    path: FramePath,
    upload: Arc<UploadShared>,
    audio: Option<AudioTrack>,
}

/// Counts consecutive decode failures so a corrupt stretch of media logs
/// the first failure and then every 30th.
#[derive(Debug, Default)]
struct ErrorThrottle {
    consecutive: u32,
}

impl ErrorThrottle {
    const EVERY: u32 = 30;

    /// Record a failure; returns the run length when it should be logged.
    fn record(&mut self) -> Option<u32> {
        self.consecutive += 1;
        (self.consecutive == 1 || self.consecutive % Self::EVERY == 0).then_some(self.consecutive)
    }

    fn clear(&mut self) {
        self.consecutive = 0;
    }
}

/// A single video player.
///
/// All methods are non-blocking apart from the positioned sample reads
/// performed during [`update`](Self::update) and the one-time open on the
/// first [`play`](Self::play).
pub struct VideoPlayer {
    config: PlayerConfig,
    backends: Backends,
    state: PlayerState,
    clock: PlaybackClock,
    cursors: Cursors,
    media: Option<Media>,
    transform: Option<Transform>,
    stats: PlayerStats,
    throttle: ErrorThrottle,
    /// Frames uploaded by media opened before the current one.
    frames_before: u64,
    resynced_last_tick: bool,
    /// Start time requested before any media was open.
    pending_start: Option<f64>,
}

impl std::fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("url", &self.config.url)
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("cursors", &self.cursors)
            .field("open", &self.media.is_some())
            .finish_non_exhaustive()
    }
}

impl VideoPlayer {
    /// Create a stopped player. Nothing is opened until [`play`](Self::play).
    pub fn new(config: PlayerConfig, backends: Backends) -> Self {
        Self {
            config: config.clamped(),
            backends,
            state: PlayerState::Stopped,
            clock: PlaybackClock::default(),
            cursors: Cursors::default(),
            media: None,
            transform: None,
            stats: PlayerStats::default(),
            throttle: ErrorThrottle::default(),
            frames_before: 0,
            resynced_last_tick: false,
            pending_start: None,
        }
    }

    /// Embedder start hook: seek to `start_time`, then play if
    /// `play_on_start`.
    ///
    /// While no media is open the start time is held and applied when the
    /// media opens.
    pub fn begin_play(&mut self) -> Result<()> {
        if self.config.start_time > 0.0 {
            if self.media.is_some() {
                self.seek(self.config.start_time);
            } else {
                self.pending_start = Some(self.config.start_time);
            }
        }
        if self.config.play_on_start {
            self.play()?;
        }
        Ok(())
    }

    /// Start or resume playback, opening the media on first use.
    ///
    /// Fails when the url is empty or the media cannot be opened; the
    /// player then stays stopped and the next call tries again.
    pub fn play(&mut self) -> Result<()> {
        if self.media.is_none() {
            if self.config.url.is_empty() {
                tracing::warn!("Play requested on a player without a media url");
                return Err(PlayerError::EmptyUrl);
            }
            if let Err(e) = self.open() {
                tracing::warn!(url = %self.config.url, error = %e, "Failed to open media");
                return Err(e);
            }
        }

        if self.state != PlayerState::Playing {
            self.state = PlayerState::Playing;
            if let Some(audio) = self.audio_mut() {
                audio.queue.play();
            }
            tracing::debug!(url = %self.config.url, time = self.clock.time(), "Playing");
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        self.state = PlayerState::Paused;
        if let Some(audio) = self.audio_mut() {
            audio.queue.pause();
        }
        tracing::debug!(url = %self.config.url, time = self.clock.time(), "Paused");
    }

    /// Stop and rewind. The next tick resynchronises at time zero.
    pub fn stop(&mut self) {
        self.state = PlayerState::Stopped;
        self.clock.rewind();
        if let Some(audio) = self.audio_mut() {
            audio.queue.stop();
        }
    }

    /// Move playback to `time` seconds, clamped to `[0, duration]`.
    /// Seeking to the current time does nothing.
    pub fn seek(&mut self, time: f64) {
        if !self.clock.seek(time) {
            return;
        }
        self.stats.seeks += 1;
        if let Some(audio) = self.audio_mut() {
            audio.queue.stop();
        }
        tracing::debug!(url = %self.config.url, time = self.clock.time(), "Seek");
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.config.looping = looping;
    }

    /// Switch to different media. Any open media is released and the
    /// player returns to Stopped.
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url == self.config.url {
            return;
        }
        self.teardown();
        self.pending_start = None;
        self.config.url = url;
        self.state = PlayerState::Stopped;
        self.clock = PlaybackClock::default();
        self.cursors = Cursors::default();
    }

    pub fn set_audio_volume(&mut self, volume: f32) {
        let volume = clamp_or(volume, 0.0, 1.0, self.config.volume);
        if volume == self.config.volume {
            return;
        }
        self.config.volume = volume;
        if let Some(audio) = self.audio_mut() {
            audio.queue.set_volume(volume);
        }
    }

    pub fn set_audio_pan(&mut self, pan: f32) {
        let pan = clamp_or(pan, -1.0, 1.0, self.config.pan);
        if pan == self.config.pan {
            return;
        }
        self.config.pan = pan;
        if let Some(audio) = self.audio_mut() {
            audio.queue.set_pan(pan);
        }
    }

    pub fn set_audio_min_distance(&mut self, min_distance: f32) {
        let min_distance = clamp_or(min_distance, 0.0, f32::MAX, self.config.min_distance);
        if min_distance == self.config.min_distance {
            return;
        }
        self.config.min_distance = min_distance;
        self.push_spatial_setup();
    }

    pub fn set_audio_attenuation(&mut self, attenuation: f32) {
        let attenuation = clamp_or(attenuation, 0.0, f32::MAX, self.config.attenuation);
        if attenuation == self.config.attenuation {
            return;
        }
        self.config.attenuation = attenuation;
        self.push_spatial_setup();
    }

    pub fn set_is_audio_spatial(&mut self, spatial: bool) {
        if spatial == self.config.is_spatial {
            return;
        }
        self.config.is_spatial = spatial;
        self.push_spatial_setup();
    }

    /// World transform the audio source follows while spatial. Applied on
    /// the next playing tick.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = Some(transform);
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Presentation time in seconds.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Zero until media is opened.
    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn frame_rate(&self) -> f64 {
        self.index().map_or(0.0, MediaIndex::frame_rate)
    }

    /// Frames that reached the frame texture. Never decreases.
    pub fn frames_count(&self) -> u64 {
        self.frames_before + self.media.as_ref().map_or(0, |m| m.upload.frames_count())
    }

    /// Presentation size; zero until media is opened.
    pub fn size(&self) -> (u32, u32) {
        self.index().map_or((0, 0), |i| (i.width(), i.height()))
    }

    /// The RGBA (or raw packed) texture frames are uploaded into. `None`
    /// before the first frame is uploaded.
    pub fn frame_texture(&self) -> Option<TextureHandle> {
        self.media.as_ref().and_then(|m| m.upload.texture())
    }

    pub fn frame_path(&self) -> Option<FramePath> {
        self.media.as_ref().map(|m| m.path)
    }

    /// The streaming source, once one was created. Stays `None` for media
    /// without audio.
    pub fn audio_source(&self) -> Option<SourceId> {
        self.media
            .as_ref()
            .and_then(|m| m.audio.as_ref())
            .and_then(|a| a.queue.source())
    }

    pub fn has_audio(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.audio.is_some())
    }

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    pub fn pan(&self) -> f32 {
        self.config.pan
    }

    pub fn min_distance(&self) -> f32 {
        self.config.min_distance
    }

    pub fn attenuation(&self) -> f32 {
        self.config.attenuation
    }

    pub fn is_spatial(&self) -> bool {
        self.config.is_spatial
    }

    pub fn is_looping(&self) -> bool {
        self.config.looping
    }

    pub fn is_open(&self) -> bool {
        self.media.is_some()
    }

    pub fn index(&self) -> Option<&MediaIndex> {
        self.media.as_ref().map(|m| m.demuxer.index())
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// Whether the last [`update`](Self::update) resynchronised the
    /// cursors and reset the video decoder.
    pub fn last_tick_resynced(&self) -> bool {
        self.resynced_last_tick
    }

    pub fn video_decoder_resets(&self) -> u64 {
        self.media
            .as_ref()
            .and_then(|m| m.video.as_ref())
            .map_or(0, VideoDecoderDriver::resets)
    }

    pub fn has_upload_in_flight(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.upload.has_in_flight())
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            frames_uploaded: self.frames_count(),
            ..self.stats
        }
    }

    fn audio_mut(&mut self) -> Option<&mut AudioTrack> {
        self.media.as_mut().and_then(|m| m.audio.as_mut())
    }

    fn push_spatial_setup(&mut self) {
        let (spatial, attenuation, min_distance) = (
            self.config.is_spatial,
            self.config.attenuation,
            self.config.min_distance,
        );
        if let Some(audio) = self.audio_mut() {
            audio.queue.set_spatial(spatial, attenuation, min_distance);
        }
    }

    /// Source parameters from the current configuration.
    fn source_desc(&self, info: AudioInfo) -> SourceDesc {
        let transform = self.transform.unwrap_or_default();
        SourceDesc {
            info,
            position: transform.position,
            orientation: transform.orientation,
            volume: self.config.volume,
            pitch: 1.0,
            pan: self.config.pan,
            looping: false,
            spatial: self.config.is_spatial,
            attenuation: self.config.attenuation,
            min_distance: self.config.min_distance,
            doppler: 1.0,
        }
    }

    fn open(&mut self) -> Result<()> {
        let url = self.config.url.clone();
        let demuxer = Demuxer::open(&url).map_err(|e| PlayerError::from_media(&url, e))?;
        let index = demuxer.index();

        let codecs = Arc::clone(&self.backends.codecs);
        let video = if index.has_video() {
            Some(VideoDecoderDriver::new(
                Arc::clone(&codecs),
                index.video_info.codec.clone(),
            )?)
        } else {
            None
        };
        let path = FramePath::select(codecs.output_format(), self.backends.gpu.as_ref());
        let upload = Arc::new(UploadShared::new(Arc::clone(&self.backends.gpu), path.texture));
        let audio = index
            .audio_info
            .as_ref()
            .and_then(|track| self.open_audio(track));

        tracing::info!(
            url = %url,
            width = index.width(),
            height = index.height(),
            frame_rate = index.frame_rate(),
            duration = index.duration,
            video = video.is_some(),
            audio = audio.is_some(),
            staged = ?path.staged,
            texture = ?path.texture,
            "Opened media"
        );

        self.clock.set_duration(index.duration);
        self.media = Some(Media {
            demuxer,
            video,
            path,
            upload,
            audio,
        });
        if let Some(start) = self.pending_start.take() {
            self.seek(start);
        }
        Ok(())
    }

    /// Audio is optional: failures are logged and the player runs video-only.
    fn open_audio(&self, track: &AudioTrackInfo) -> Option<AudioTrack> {
        let decoder = match AudioDecoderDriver::configure(
            self.backends.codecs.as_ref(),
            &track.codec,
            track.format,
        ) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "Audio decoder unavailable, playing video only");
                return None;
            }
        };

        let mut queue = AudioQueue::new(
            Arc::clone(&self.backends.audio),
            self.config.audio_ring_capacity,
        );
        let info = decoder.info();
        if info.is_complete() {
            if let Err(e) = queue.ensure_source(&self.source_desc(info)) {
                tracing::warn!(url = %self.config.url, error = %e, "Audio source creation deferred");
            }
        }
        Some(AudioTrack { decoder, queue })
    }

    /// Release the open media: cancel the in-flight upload, tear down the
    /// audio source and its buffers. GPU resources go once the last task
    /// reference is gone.
    fn teardown(&mut self) {
        let Some(media) = self.media.take() else {
            return;
        };
        let uploads = self.backends.uploads.as_ref();
        media.upload.cancel_in_flight(uploads);
        if let Some(texture) = media.upload.texture() {
            if uploads.has_reference(GpuResource::Texture(texture)) {
                tracing::debug!(url = %self.config.url, "Frame texture still referenced by a running upload");
            }
        }
        self.frames_before += media.upload.frames_count();
        tracing::debug!(url = %self.config.url, "Released media");
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.teardown();
    }
}
