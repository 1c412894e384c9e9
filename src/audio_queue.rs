//! Streaming audio queue.
//!
//! A fixed ring of backend buffer handles feeding one streaming source.
//! Buffers are queued in ring order and the device plays them in queue
//! order, so while fewer than `capacity` buffers are queued the slot at
//! `next` is never on the source.

use crate::backend::{AudioBackend, AudioBufferId, AudioError, SourceDesc, SourceId};
use std::sync::Arc;
use vidcore_media::AudioInfo;

pub struct AudioQueue {
    audio: Arc<dyn AudioBackend>,
    source: Option<SourceId>,
    ring: Vec<Option<AudioBufferId>>,
    next: usize,
    play_pending: bool,
}

impl std::fmt::Debug for AudioQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioQueue")
            .field("source", &self.source)
            .field("capacity", &self.ring.len())
            .field("next", &self.next)
            .field("play_pending", &self.play_pending)
            .finish()
    }
}

impl AudioQueue {
    /// An empty queue; no backend objects are created until needed.
    /// A capacity of zero is raised to one.
    pub fn new(audio: Arc<dyn AudioBackend>, capacity: usize) -> Self {
        Self {
            audio,
            source: None,
            ring: vec![None; capacity.max(1)],
            next: 0,
            play_pending: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn play_pending(&self) -> bool {
        self.play_pending
    }

    /// Create the source if it does not exist yet.
    pub fn ensure_source(&mut self, desc: &SourceDesc) -> Result<SourceId, AudioError> {
        if let Some(source) = self.source {
            return Ok(source);
        }
        let source = self.audio.source_add(desc)?;
        tracing::debug!(
            source = source.0,
            sample_rate = desc.info.sample_rate,
            channels = desc.info.channels,
            spatial = desc.spatial,
            "Created audio source"
        );
        self.source = Some(source);
        Ok(source)
    }

    /// Dequeue processed buffers and return how many remain queued. An
    /// empty source (underrun or not yet started) arms a deferred play.
    pub fn reclaim(&mut self) -> usize {
        let Some(source) = self.source else {
            return 0;
        };
        if self.audio.processed_buffers_count(source) > 0 {
            self.audio.dequeue_processed_buffers(source);
        }
        let queued = self.audio.queued_buffers_count(source);
        if queued == 0 {
            self.play_pending = true;
        }
        queued
    }

    /// Write `pcm` into the slot at `next` and queue it on the source.
    pub fn submit(&mut self, pcm: &[u8], info: &AudioInfo) -> Result<(), AudioError> {
        let source = self
            .source
            .ok_or_else(|| AudioError::Backend("no audio source".to_string()))?;

        let buffer = match self.ring[self.next] {
            Some(buffer) => buffer,
            None => {
                let buffer = self.audio.buffer_create()?;
                self.ring[self.next] = Some(buffer);
                buffer
            }
        };
        self.audio.buffer_write(buffer, pcm, info)?;
        self.audio.queue_buffer(source, buffer);
        self.next = (self.next + 1) % self.ring.len();
        Ok(())
    }

    /// Request playback. Starts the source now if it has data, otherwise
    /// on the next submission.
    pub fn play(&mut self) {
        self.play_pending = true;
        self.kick();
    }

    /// Start a deferred play once the source has something queued.
    pub fn kick(&mut self) {
        let Some(source) = self.source else {
            return;
        };
        if self.play_pending && self.audio.queued_buffers_count(source) > 0 {
            self.audio.source_play(source);
            self.play_pending = false;
        }
    }

    pub fn pause(&mut self) {
        self.play_pending = false;
        if let Some(source) = self.source {
            self.audio.source_pause(source);
        }
    }

    /// Stop the source; queued buffers become processed and are reclaimed
    /// on the next tick. The next submission restarts playback.
    pub fn stop(&mut self) {
        self.play_pending = true;
        if let Some(source) = self.source {
            self.audio.source_stop(source);
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if let Some(source) = self.source {
            self.audio.source_volume_changed(source, volume);
        }
    }

    pub fn set_pan(&self, pan: f32) {
        if let Some(source) = self.source {
            self.audio.source_pan_changed(source, pan);
        }
    }

    pub fn set_spatial(&self, spatial: bool, attenuation: f32, min_distance: f32) {
        if let Some(source) = self.source {
            self.audio
                .source_spatial_setup_changed(source, spatial, attenuation, min_distance, 1.0);
        }
    }

    pub fn set_transform(&self, position: [f32; 3], orientation: [f32; 4]) {
        if let Some(source) = self.source {
            self.audio
                .source_transform_changed(source, position, orientation);
        }
    }
}

impl Drop for AudioQueue {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            self.audio.source_stop(source);
            self.audio.dequeue_processed_buffers(source);
            for buffer in self.ring.iter_mut().filter_map(Option::take) {
                self.audio.buffer_delete(buffer);
            }
            self.audio.source_remove(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::{NullAudio, SourceStatus};

    fn info() -> AudioInfo {
        AudioInfo {
            sample_rate: 48000,
            channels: 2,
            bits_per_sample: 16,
        }
    }

    fn desc() -> SourceDesc {
        SourceDesc {
            info: info(),
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            looping: false,
            spatial: false,
            attenuation: 1.0,
            min_distance: 1000.0,
            doppler: 1.0,
        }
    }

    fn queue(capacity: usize) -> (Arc<NullAudio>, AudioQueue, SourceId) {
        let audio = Arc::new(NullAudio::new());
        let mut queue = AudioQueue::new(audio.clone(), capacity);
        let source = queue.ensure_source(&desc()).unwrap();
        (audio, queue, source)
    }

    #[test]
    fn test_deferred_play_waits_for_data() {
        let (audio, mut queue, source) = queue(4);
        queue.play();
        assert!(queue.play_pending());
        assert_eq!(audio.snapshot(source).unwrap().play_calls, 0);

        assert_eq!(queue.reclaim(), 0);
        queue.submit(&[0; 16], &info()).unwrap();
        queue.kick();
        assert!(!queue.play_pending());
        let snap = audio.snapshot(source).unwrap();
        assert_eq!(snap.status, SourceStatus::Playing);
        assert_eq!(snap.play_calls, 1);
    }

    #[test]
    fn test_ring_reuses_buffers() {
        let (audio, mut queue, source) = queue(3);
        for _ in 0..3 {
            queue.submit(&[0; 8], &info()).unwrap();
        }
        assert_eq!(audio.buffers_created(), 3);

        audio.consume(source, 2);
        assert_eq!(queue.reclaim(), 1);
        queue.submit(&[0; 8], &info()).unwrap();
        queue.submit(&[0; 8], &info()).unwrap();
        assert_eq!(audio.buffers_created(), 3);
        assert_eq!(audio.queued_buffers_count(source), 3);
    }

    #[test]
    fn test_stop_rearms_play() {
        let (audio, mut queue, source) = queue(2);
        queue.submit(&[0; 8], &info()).unwrap();
        queue.play();
        queue.stop();
        assert!(queue.play_pending());
        assert_eq!(queue.reclaim(), 0);
        assert_eq!(audio.snapshot(source).unwrap().processed, 0);
    }

    #[test]
    fn test_pause_clears_pending() {
        let (audio, mut queue, source) = queue(2);
        queue.play();
        queue.pause();
        assert!(!queue.play_pending());
        assert_eq!(audio.snapshot(source).unwrap().status, SourceStatus::Paused);
    }

    #[test]
    fn test_submit_without_source() {
        let audio = Arc::new(NullAudio::new());
        let mut queue = AudioQueue::new(audio, 2);
        assert!(queue.submit(&[0; 4], &info()).is_err());
        assert_eq!(queue.reclaim(), 0);
    }

    #[test]
    fn test_drop_releases_everything() {
        let (audio, mut queue, _) = queue(4);
        queue.submit(&[0; 8], &info()).unwrap();
        queue.submit(&[0; 8], &info()).unwrap();
        drop(queue);
        assert_eq!(audio.live_sources(), 0);
        assert_eq!(audio.live_buffers(), 0);
    }

    #[test]
    fn test_parameter_updates_in_place() {
        let (audio, queue, source) = queue(2);
        queue.set_volume(0.25);
        queue.set_pan(-1.0);
        queue.set_spatial(true, 2.0, 50.0);
        queue.set_transform([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0]);
        let snap = audio.snapshot(source).unwrap();
        assert_eq!(snap.volume, 0.25);
        assert_eq!(snap.pan, -1.0);
        assert!(snap.spatial);
        assert_eq!(snap.min_distance, 50.0);
        assert_eq!(snap.position, Some([1.0, 2.0, 3.0]));
        assert_eq!(audio.sources_created(), 1);
    }
}
