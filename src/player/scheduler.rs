//! Per-tick presentation scheduling.
//!
//! One call to [`VideoPlayer::update`] advances the clock, handles the end
//! of the media, resynchronises after discontinuities, presents at most
//! one video sample and tops up the audio queue.

use super::{AudioTrack, EndOfMedia, ErrorThrottle, Media, PlayerState, VideoPlayer};
use crate::backend::{AudioError, SourceDesc};
use crate::convert::pack_picture;
use crate::decode::DecodeError;
use crate::error::PlayerError;
use crate::stats::PlayerStats;
use crate::tick::TickContext;
use crate::upload::StagedFrame;
use vidcore_media::{AudioInfo, Demuxer, SampleInfo};

impl VideoPlayer {
    /// Advance the player by one engine tick.
    ///
    /// Does nothing unless the player is playing or a resync is pending.
    /// Errors are absorbed here: a sample that fails to read or decode is
    /// skipped and playback carries on.
    pub fn update(&mut self, tick: &TickContext) {
        self.resynced_last_tick = false;
        if self.media.is_none() {
            return;
        }
        if self.state != PlayerState::Playing && !self.clock.seek_pending() {
            return;
        }

        // The first playing tick after open or Stop shows the frame at the
        // current time instead of moving past it.
        if self.state == PlayerState::Playing && !self.clock.take_first_frame() {
            self.clock.advance(tick.dt());
        }

        if self.state == PlayerState::Playing {
            self.check_end_of_media();
        }

        if self.clock.take_seek_pending() {
            self.resync();
        }

        if self.state == PlayerState::Playing {
            self.present_video();
            self.feed_audio();
            self.follow_transform();
        }

        if let Some(media) = &self.media {
            media.upload.pump(self.backends.uploads.as_ref());
        }
    }

    fn check_end_of_media(&mut self) {
        match self.clock.check_end(self.config.looping) {
            EndOfMedia::None => {}
            EndOfMedia::Looped => {
                self.stats.loops += 1;
                tracing::debug!(url = %self.config.url, time = self.clock.time(), "Looped");
            }
            EndOfMedia::Ended => {
                self.state = PlayerState::Paused;
                if let Some(audio) = self.audio_mut() {
                    audio.queue.pause();
                }
                tracing::debug!(url = %self.config.url, "Reached end of media");
            }
        }
    }

    /// Reset the video decoder and point both cursors at the samples
    /// closest to the current time.
    fn resync(&mut self) {
        let Some(media) = self.media.as_mut() else {
            return;
        };
        if let Some(video) = media.video.as_mut() {
            if let Err(e) = video.reset() {
                tracing::warn!(url = %self.config.url, error = %e, "Video decoder reset failed");
            }
        }

        let time = self.clock.time();
        let index = media.demuxer.index();
        let video = index.video.as_ref().map_or(0, |track| track.closest(time));
        let audio = index.audio.as_ref().map_or(0, |track| track.closest(time));
        self.cursors.resync(video, audio);
        self.resynced_last_tick = true;
        tracing::trace!(time, video, audio, "Resynchronised cursors");
    }

    /// Decode the sample under the video cursor if it is due. Exactly one
    /// sample is consumed per tick however far the clock moved.
    fn present_video(&mut self) {
        let Some(media) = self.media.as_mut() else {
            return;
        };
        if self.cursors.video_exhausted {
            return;
        }
        let Some(track) = media.demuxer.index().video.as_ref() else {
            return;
        };
        let len = track.len();
        let Some(sample) = track.get(self.cursors.video).copied() else {
            return;
        };
        if sample.timestamp > self.clock.time() {
            return;
        }

        self.stats.video_samples += 1;
        match media.decode_frame(&sample) {
            Ok(Some(frame)) => {
                self.stats.frames_decoded += 1;
                self.throttle.clear();
                media.upload.stage(frame);
                media.upload.pump(self.backends.uploads.as_ref());
            }
            Ok(None) => self.throttle.clear(),
            Err(e) => {
                self.stats.frames_dropped += 1;
                report_decode_error(
                    &mut self.throttle,
                    &mut self.stats,
                    &self.config.url,
                    "video",
                    &sample,
                    &e,
                );
            }
        }
        self.cursors.advance_video(len);
    }

    /// Reclaim processed audio buffers and queue every due sample until the
    /// ring is full.
    fn feed_audio(&mut self) {
        let template = self.source_desc(AudioInfo::default());
        let time = self.clock.time();
        let Some(media) = self.media.as_mut() else {
            return;
        };
        let Some(audio) = media.audio.as_mut() else {
            return;
        };
        let Some(len) = media.demuxer.index().audio.as_ref().map(|t| t.len()) else {
            return;
        };

        let queued = audio.queue.reclaim();
        let mut added = 0;
        while queued + added < audio.queue.capacity() && !self.cursors.audio_exhausted {
            let Some(sample) = media
                .demuxer
                .index()
                .audio
                .as_ref()
                .and_then(|t| t.get(self.cursors.audio))
                .copied()
            else {
                break;
            };
            if sample.timestamp > time {
                break;
            }

            match submit_audio(&mut media.demuxer, audio, &sample, &template) {
                Ok(()) => {
                    added += 1;
                    self.stats.audio_buffers_queued += 1;
                    self.throttle.clear();
                }
                Err(e) => {
                    self.stats.audio_samples_dropped += 1;
                    report_decode_error(
                        &mut self.throttle,
                        &mut self.stats,
                        &self.config.url,
                        "audio",
                        &sample,
                        &e,
                    );
                }
            }
            self.cursors.advance_audio(len);
        }

        audio.queue.kick();
    }

    fn follow_transform(&mut self) {
        if !self.config.is_spatial {
            return;
        }
        let Some(transform) = self.transform else {
            return;
        };
        if let Some(audio) = self.audio_mut() {
            audio
                .queue
                .set_transform(transform.position, transform.orientation);
        }
    }
}

impl Media {
    /// Read, decode and pack one video sample. `Ok(None)` while the decoder
    /// is still filling its reorder window.
    fn decode_frame(&mut self, sample: &SampleInfo) -> Result<Option<StagedFrame>, PlayerError> {
        let Some(video) = self.video.as_mut() else {
            return Ok(None);
        };
        let data = self.demuxer.read_sample(sample).map_err(DecodeError::from)?;
        let Some(picture) = video.decode(&data)? else {
            return Ok(None);
        };

        let mut buffer = self.upload.take_buffer();
        let format = pack_picture(&picture, &mut buffer)?;
        Ok(Some(StagedFrame {
            data: buffer,
            format,
            width: picture.width,
            height: picture.height,
            sample: sample.index,
        }))
    }
}

fn submit_audio(
    demuxer: &mut Demuxer,
    audio: &mut AudioTrack,
    sample: &SampleInfo,
    template: &SourceDesc,
) -> Result<(), PlayerError> {
    let data = demuxer.read_sample(sample).map_err(DecodeError::from)?;
    let pcm = audio.decoder.decode(&data)?;
    let info = audio.decoder.info();

    if audio.queue.source().is_none() {
        if !info.is_complete() {
            let reason = format!("stream format still unknown: {info:?}");
            return Err(AudioError::SourceCreate(reason).into());
        }
        audio.queue.ensure_source(&SourceDesc { info, ..*template })?;
    }
    audio.queue.submit(&pcm, &info)?;
    Ok(())
}

fn report_decode_error(
    throttle: &mut ErrorThrottle,
    stats: &mut PlayerStats,
    url: &str,
    track: &'static str,
    sample: &SampleInfo,
    error: &PlayerError,
) {
    stats.decode_errors += 1;
    if let Some(consecutive) = throttle.record() {
        tracing::warn!(
            url = %url,
            track,
            sample = sample.index,
            consecutive,
            error = %error,
            "Dropping undecodable sample"
        );
    }
}
