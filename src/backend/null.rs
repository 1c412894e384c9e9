//! In-memory backends.
//!
//! They perform no rendering, mixing or decoding, but keep a ledger of every
//! call so the headless `simulate` command and the test suite can observe
//! what a player did.

use super::audio::{AudioBackend, AudioBufferId, AudioError, SourceDesc, SourceId};
use super::codec::{
    AudioDecoder, CodecError, CodecProvider, DecodedPicture, PictureFormat, Plane, VideoDecoder,
};
use super::gpu::{
    BufferDesc, BufferHandle, DecodePipeline, GpuDevice, GpuError, GpuResource, TextureDesc,
    TextureHandle, TextureUpdate,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vidcore_media::{AacConfig, AudioInfo, AvcConfig};

// ---------------------------------------------------------------------------
// GPU
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GpuLedger {
    next_id: u64,
    textures: HashMap<TextureHandle, TextureDesc>,
    buffers: HashMap<BufferHandle, BufferDesc>,
    textures_created: usize,
    texture_updates: usize,
    buffer_updates: usize,
    draws: usize,
    render_target: Option<TextureHandle>,
    bound: Option<BufferHandle>,
    pipeline: Option<DecodePipeline>,
}

/// GPU device that tracks resources in a map.
#[derive(Debug)]
pub struct NullGpu {
    pipelines: Vec<DecodePipeline>,
    ledger: Mutex<GpuLedger>,
}

impl Default for NullGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl NullGpu {
    /// Device exposing both decode pipelines.
    pub fn new() -> Self {
        Self::with_pipelines(&[DecodePipeline::Yuy2, DecodePipeline::Nv12])
    }

    pub fn with_pipelines(pipelines: &[DecodePipeline]) -> Self {
        Self {
            pipelines: pipelines.to_vec(),
            ledger: Mutex::new(GpuLedger::default()),
        }
    }

    pub fn live_textures(&self) -> usize {
        self.ledger.lock().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.ledger.lock().buffers.len()
    }

    pub fn textures_created(&self) -> usize {
        self.ledger.lock().textures_created
    }

    pub fn texture_updates(&self) -> usize {
        self.ledger.lock().texture_updates
    }

    pub fn buffer_updates(&self) -> usize {
        self.ledger.lock().buffer_updates
    }

    pub fn draws(&self) -> usize {
        self.ledger.lock().draws
    }

    pub fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc> {
        self.ledger.lock().textures.get(&texture).copied()
    }
}

impl GpuDevice for NullGpu {
    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandle, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::CreateFailed(format!(
                "empty texture {}x{}",
                desc.width, desc.height
            )));
        }
        let mut ledger = self.ledger.lock();
        ledger.next_id += 1;
        let handle = TextureHandle(ledger.next_id);
        ledger.textures.insert(handle, *desc);
        ledger.textures_created += 1;
        Ok(handle)
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        let mut ledger = self.ledger.lock();
        ledger.textures.remove(&texture);
        if ledger.render_target == Some(texture) {
            ledger.render_target = None;
        }
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle, GpuError> {
        if desc.size == 0 {
            return Err(GpuError::CreateFailed("empty buffer".to_string()));
        }
        let mut ledger = self.ledger.lock();
        ledger.next_id += 1;
        let handle = BufferHandle(ledger.next_id);
        ledger.buffers.insert(handle, *desc);
        Ok(handle)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut ledger = self.ledger.lock();
        ledger.buffers.remove(&buffer);
        if ledger.bound == Some(buffer) {
            ledger.bound = None;
        }
    }

    fn update_texture(
        &self,
        texture: TextureHandle,
        update: TextureUpdate<'_>,
    ) -> Result<(), GpuError> {
        let mut ledger = self.ledger.lock();
        let desc = ledger
            .textures
            .get(&texture)
            .copied()
            .ok_or(GpuError::InvalidResource(GpuResource::Texture(texture)))?;

        let expected = desc.format.slice_pitch(desc.width, desc.height);
        if update.slice_pitch != expected || update.data.len() < expected {
            return Err(GpuError::SizeMismatch {
                expected,
                got: update.data.len(),
            });
        }
        ledger.texture_updates += 1;
        Ok(())
    }

    fn update_buffer(&self, buffer: BufferHandle, data: &[u8]) -> Result<(), GpuError> {
        let mut ledger = self.ledger.lock();
        let desc = ledger
            .buffers
            .get(&buffer)
            .copied()
            .ok_or(GpuError::InvalidResource(GpuResource::Buffer(buffer)))?;
        if data.len() > desc.size {
            return Err(GpuError::SizeMismatch {
                expected: desc.size,
                got: data.len(),
            });
        }
        ledger.buffer_updates += 1;
        Ok(())
    }

    fn has_pipeline(&self, pipeline: DecodePipeline) -> bool {
        self.pipelines.contains(&pipeline)
    }

    fn set_render_target(&self, texture: TextureHandle) -> Result<(), GpuError> {
        let mut ledger = self.ledger.lock();
        if !ledger.textures.contains_key(&texture) {
            return Err(GpuError::InvalidResource(GpuResource::Texture(texture)));
        }
        ledger.render_target = Some(texture);
        Ok(())
    }

    fn bind_shader_resource(&self, _slot: u32, buffer: BufferHandle) -> Result<(), GpuError> {
        let mut ledger = self.ledger.lock();
        if !ledger.buffers.contains_key(&buffer) {
            return Err(GpuError::InvalidResource(GpuResource::Buffer(buffer)));
        }
        ledger.bound = Some(buffer);
        Ok(())
    }

    fn set_pipeline_state(&self, pipeline: DecodePipeline) -> Result<(), GpuError> {
        if !self.has_pipeline(pipeline) {
            return Err(GpuError::MissingPipeline(pipeline));
        }
        self.ledger.lock().pipeline = Some(pipeline);
        Ok(())
    }

    fn draw_fullscreen_triangle(&self) -> Result<(), GpuError> {
        let mut ledger = self.ledger.lock();
        if ledger.render_target.is_none() || ledger.bound.is_none() || ledger.pipeline.is_none() {
            return Err(GpuError::Command(
                "draw without render target, input or pipeline".to_string(),
            ));
        }
        ledger.draws += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Playback status of a null audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStatus {
    #[default]
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Observable state of one null audio source.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub status: SourceStatus,
    pub queued: usize,
    pub processed: usize,
    /// High-water mark of `queued`.
    pub max_queued: usize,
    pub buffers_queued_total: usize,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub stop_calls: usize,
    pub volume: f32,
    pub pan: f32,
    pub spatial: bool,
    pub attenuation: f32,
    pub min_distance: f32,
    pub position: Option<[f32; 3]>,
}

#[derive(Debug)]
struct NullSource {
    snapshot: SourceSnapshot,
    queue: VecDeque<AudioBufferId>,
    processed: VecDeque<AudioBufferId>,
}

impl NullSource {
    fn sync_counts(&mut self) {
        self.snapshot.queued = self.queue.len();
        self.snapshot.processed = self.processed.len();
        self.snapshot.max_queued = self.snapshot.max_queued.max(self.queue.len());
    }
}

#[derive(Debug, Default)]
struct AudioLedger {
    next_id: u32,
    sources: HashMap<SourceId, NullSource>,
    buffers: HashMap<AudioBufferId, usize>,
    sources_created: usize,
    buffers_created: usize,
}

/// Audio backend that never plays anything; buffers only leave the queue
/// when [`NullAudio::consume`] is called.
#[derive(Debug, Default)]
pub struct NullAudio {
    ledger: Mutex<AudioLedger>,
}

impl NullAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark up to `count` queued buffers of `source` as processed, as if the
    /// device had played them. Returns how many moved.
    pub fn consume(&self, source: SourceId, count: usize) -> usize {
        let mut ledger = self.ledger.lock();
        let Some(src) = ledger.sources.get_mut(&source) else {
            return 0;
        };
        let moved = count.min(src.queue.len());
        let played: Vec<_> = src.queue.drain(..moved).collect();
        src.processed.extend(played);
        src.sync_counts();
        moved
    }

    /// Consume `count` buffers on every playing source.
    pub fn consume_playing(&self, count: usize) {
        let playing: Vec<SourceId> = self
            .ledger
            .lock()
            .sources
            .iter()
            .filter(|(_, s)| s.snapshot.status == SourceStatus::Playing)
            .map(|(id, _)| *id)
            .collect();
        for id in playing {
            self.consume(id, count);
        }
    }

    pub fn snapshot(&self, source: SourceId) -> Option<SourceSnapshot> {
        self.ledger
            .lock()
            .sources
            .get(&source)
            .map(|s| s.snapshot.clone())
    }

    pub fn sources_created(&self) -> usize {
        self.ledger.lock().sources_created
    }

    pub fn live_sources(&self) -> usize {
        self.ledger.lock().sources.len()
    }

    pub fn buffers_created(&self) -> usize {
        self.ledger.lock().buffers_created
    }

    pub fn live_buffers(&self) -> usize {
        self.ledger.lock().buffers.len()
    }

    fn with_source(&self, source: SourceId, f: impl FnOnce(&mut NullSource)) {
        if let Some(src) = self.ledger.lock().sources.get_mut(&source) {
            f(src);
            src.sync_counts();
        }
    }
}

impl AudioBackend for NullAudio {
    fn source_add(&self, desc: &SourceDesc) -> Result<SourceId, AudioError> {
        if !desc.info.is_complete() {
            return Err(AudioError::SourceCreate(format!(
                "incomplete format {:?}",
                desc.info
            )));
        }
        let mut ledger = self.ledger.lock();
        ledger.next_id += 1;
        let id = SourceId(ledger.next_id);
        ledger.sources.insert(
            id,
            NullSource {
                snapshot: SourceSnapshot {
                    volume: desc.volume,
                    pan: desc.pan,
                    spatial: desc.spatial,
                    attenuation: desc.attenuation,
                    min_distance: desc.min_distance,
                    position: desc.spatial.then_some(desc.position),
                    ..SourceSnapshot::default()
                },
                queue: VecDeque::new(),
                processed: VecDeque::new(),
            },
        );
        ledger.sources_created += 1;
        Ok(id)
    }

    fn source_play(&self, source: SourceId) {
        self.with_source(source, |s| {
            s.snapshot.status = SourceStatus::Playing;
            s.snapshot.play_calls += 1;
        });
    }

    fn source_pause(&self, source: SourceId) {
        self.with_source(source, |s| {
            s.snapshot.status = SourceStatus::Paused;
            s.snapshot.pause_calls += 1;
        });
    }

    fn source_stop(&self, source: SourceId) {
        self.with_source(source, |s| {
            s.snapshot.status = SourceStatus::Stopped;
            s.snapshot.stop_calls += 1;
            let drained: Vec<_> = s.queue.drain(..).collect();
            s.processed.extend(drained);
        });
    }

    fn source_remove(&self, source: SourceId) {
        self.ledger.lock().sources.remove(&source);
    }

    fn source_volume_changed(&self, source: SourceId, volume: f32) {
        self.with_source(source, |s| s.snapshot.volume = volume);
    }

    fn source_pan_changed(&self, source: SourceId, pan: f32) {
        self.with_source(source, |s| s.snapshot.pan = pan);
    }

    fn source_spatial_setup_changed(
        &self,
        source: SourceId,
        spatial: bool,
        attenuation: f32,
        min_distance: f32,
        _doppler: f32,
    ) {
        self.with_source(source, |s| {
            s.snapshot.spatial = spatial;
            s.snapshot.attenuation = attenuation;
            s.snapshot.min_distance = min_distance;
        });
    }

    fn source_transform_changed(&self, source: SourceId, position: [f32; 3], _orientation: [f32; 4]) {
        self.with_source(source, |s| s.snapshot.position = Some(position));
    }

    fn processed_buffers_count(&self, source: SourceId) -> usize {
        self.ledger
            .lock()
            .sources
            .get(&source)
            .map_or(0, |s| s.processed.len())
    }

    fn queued_buffers_count(&self, source: SourceId) -> usize {
        self.ledger
            .lock()
            .sources
            .get(&source)
            .map_or(0, |s| s.queue.len())
    }

    fn dequeue_processed_buffers(&self, source: SourceId) {
        self.with_source(source, |s| s.processed.clear());
    }

    fn queue_buffer(&self, source: SourceId, buffer: AudioBufferId) {
        self.with_source(source, |s| {
            s.queue.push_back(buffer);
            s.snapshot.buffers_queued_total += 1;
        });
    }

    fn buffer_create(&self) -> Result<AudioBufferId, AudioError> {
        let mut ledger = self.ledger.lock();
        ledger.next_id += 1;
        let id = AudioBufferId(ledger.next_id);
        ledger.buffers.insert(id, 0);
        ledger.buffers_created += 1;
        Ok(id)
    }

    fn buffer_delete(&self, buffer: AudioBufferId) {
        self.ledger.lock().buffers.remove(&buffer);
    }

    fn buffer_write(
        &self,
        buffer: AudioBufferId,
        data: &[u8],
        info: &AudioInfo,
    ) -> Result<(), AudioError> {
        if !info.is_complete() {
            return Err(AudioError::Backend(format!("incomplete format {info:?}")));
        }
        let mut ledger = self.ledger.lock();
        let len = ledger
            .buffers
            .get_mut(&buffer)
            .ok_or(AudioError::InvalidBuffer(buffer))?;
        *len = data.len();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CodecCounters {
    video_decoders_created: AtomicUsize,
    audio_decoders_created: AtomicUsize,
    video_inputs: AtomicUsize,
    inputs_with_parameter_sets: AtomicUsize,
    pictures: AtomicUsize,
    fail_next: AtomicUsize,
}

/// Decoder factory producing synthetic pictures and silent PCM.
///
/// Video decoders really parse their Annex-B input: a slice arriving before
/// any SPS/PPS since the decoder was created is rejected, the way a real
/// decoder refuses to start mid-stream.
#[derive(Debug, Clone)]
pub struct NullCodecs {
    format: PictureFormat,
    width: u32,
    height: u32,
    reorder_delay: usize,
    /// Rate reported after the first audio decode when the config had none.
    fallback_rate: u32,
    counters: Arc<CodecCounters>,
}

impl NullCodecs {
    pub fn new(format: PictureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            reorder_delay: 0,
            fallback_rate: 48000,
            counters: Arc::new(CodecCounters::default()),
        }
    }

    /// Hold back `frames` pictures, like a decoder reordering B-frames.
    pub fn with_reorder_delay(mut self, frames: usize) -> Self {
        self.reorder_delay = frames;
        self
    }

    /// Make the next `count` video decode calls fail.
    pub fn fail_next(&self, count: usize) {
        self.counters.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn video_decoders_created(&self) -> usize {
        self.counters.video_decoders_created.load(Ordering::SeqCst)
    }

    pub fn audio_decoders_created(&self) -> usize {
        self.counters.audio_decoders_created.load(Ordering::SeqCst)
    }

    /// Video access units received across all decoders.
    pub fn video_inputs(&self) -> usize {
        self.counters.video_inputs.load(Ordering::SeqCst)
    }

    /// Video access units that carried an SPS.
    pub fn inputs_with_parameter_sets(&self) -> usize {
        self.counters.inputs_with_parameter_sets.load(Ordering::SeqCst)
    }

    pub fn pictures_emitted(&self) -> usize {
        self.counters.pictures.load(Ordering::SeqCst)
    }
}

impl CodecProvider for NullCodecs {
    fn output_format(&self) -> PictureFormat {
        self.format
    }

    fn create_video_decoder(&self, config: &AvcConfig) -> Result<Box<dyn VideoDecoder>, CodecError> {
        if config.sps.is_empty() {
            return Err(CodecError::Create("no SPS".to_string()));
        }
        self.counters
            .video_decoders_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(NullVideoDecoder {
            format: self.format,
            width: self.width,
            height: self.height,
            delay: self.reorder_delay,
            has_parameter_sets: false,
            pending: VecDeque::new(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn create_audio_decoder(&self) -> Result<Box<dyn AudioDecoder>, CodecError> {
        self.counters
            .audio_decoders_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(NullAudioDecoder {
            info: AudioInfo::default(),
            fallback_rate: self.fallback_rate,
            frame_samples: 1024,
        }))
    }
}

struct NullVideoDecoder {
    format: PictureFormat,
    width: u32,
    height: u32,
    delay: usize,
    has_parameter_sets: bool,
    pending: VecDeque<DecodedPicture>,
    counters: Arc<CodecCounters>,
}

/// Split an Annex-B stream on four-byte start codes.
fn annexb_units(data: &[u8]) -> AnnexBUnits<'_> {
    AnnexBUnits { data, pos: 0 }
}

struct AnnexBUnits<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for AnnexBUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.data.get(self.pos..)?;
        let start = rest.windows(4).position(|w| w == [0, 0, 0, 1])? + 4;
        let body = &rest[start..];
        let len = body
            .windows(4)
            .position(|w| w == [0, 0, 0, 1])
            .unwrap_or(body.len());
        self.pos += start + len;
        Some(&body[..len])
    }
}

impl NullVideoDecoder {
    fn picture(&self, shade: u8) -> DecodedPicture {
        let (w, h) = (self.width as usize, self.height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let plane = |stride: usize, rows: usize, value: u8| Plane {
            data: vec![value; stride * rows],
            stride,
        };

        let planes = match self.format {
            PictureFormat::I420 => vec![plane(w, h, shade), plane(cw, ch, 128), plane(cw, ch, 128)],
            PictureFormat::Nv12 => vec![plane(w, h, shade), plane(cw * 2, ch, 128)],
            PictureFormat::Yuy2 => vec![plane(cw * 4, h, shade)],
            PictureFormat::Rgba8 | PictureFormat::Bgra8 => vec![plane(w * 4, h, shade)],
        };

        DecodedPicture {
            width: self.width,
            height: self.height,
            format: self.format,
            planes,
        }
    }
}

impl VideoDecoder for NullVideoDecoder {
    fn decode(&mut self, access_unit: &[u8]) -> Result<Option<DecodedPicture>, CodecError> {
        self.counters.video_inputs.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .counters
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CodecError::Decode("injected failure".to_string()));
        }

        let mut saw_sps = false;
        let mut slices = 0;
        for nal in annexb_units(access_unit) {
            match nal.first().map(|b| b & 0x1F) {
                Some(7) => saw_sps = true,
                Some(8) => {}
                Some(1) | Some(5) => {
                    if !(self.has_parameter_sets || saw_sps) {
                        return Err(CodecError::Decode(
                            "slice before parameter sets".to_string(),
                        ));
                    }
                    // luma takes the last byte of the slice header
                    let shade = nal.get(4).copied().unwrap_or(0);
                    let picture = self.picture(shade);
                    self.pending.push_back(picture);
                    slices += 1;
                }
                _ => {}
            }
        }

        if saw_sps {
            self.has_parameter_sets = true;
            self.counters
                .inputs_with_parameter_sets
                .fetch_add(1, Ordering::SeqCst);
        }
        if slices == 0 {
            return Err(CodecError::Decode("access unit without slices".to_string()));
        }

        if self.pending.len() > self.delay {
            self.counters.pictures.fetch_add(1, Ordering::SeqCst);
            Ok(self.pending.pop_front())
        } else {
            Ok(None)
        }
    }
}

struct NullAudioDecoder {
    info: AudioInfo,
    fallback_rate: u32,
    frame_samples: usize,
}

impl AudioDecoder for NullAudioDecoder {
    fn configure(&mut self, config: &AacConfig) -> Result<AudioInfo, CodecError> {
        self.info = AudioInfo {
            sample_rate: config.sample_rate,
            channels: config.channels as u16,
            bits_per_sample: 16,
        };
        Ok(self.info)
    }

    fn decode(&mut self, access_unit: &[u8]) -> Result<Vec<u8>, CodecError> {
        if access_unit.is_empty() {
            return Err(CodecError::Decode("empty access unit".to_string()));
        }
        if self.info.sample_rate == 0 {
            self.info.sample_rate = self.fallback_rate;
        }
        if self.info.channels == 0 {
            self.info.channels = 2;
        }
        let channels = self.info.channels as usize;
        Ok(vec![0u8; self.frame_samples * channels * 2])
    }

    fn stream_info(&self) -> AudioInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avc() -> AvcConfig {
        AvcConfig::parse(&[
            0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00,
            0x02, 0x68, 0xEE,
        ])
        .unwrap()
    }

    fn idr(shade: u8) -> Vec<u8> {
        vec![0, 0, 0, 1, 0x65, 0x80, 0x80, 0x80, 0x80 | shade]
    }

    #[test]
    fn test_annexb_split() {
        let data = [0, 0, 0, 1, 0x67, 0xAA, 0, 0, 0, 1, 0x68, 0, 0, 0, 1, 0x65, 0x01];
        let units: Vec<&[u8]> = annexb_units(&data).collect();
        assert_eq!(units, vec![&[0x67, 0xAA][..], &[0x68][..], &[0x65, 0x01][..]]);
    }

    #[test]
    fn test_video_decoder_requires_parameter_sets() {
        let codecs = NullCodecs::new(PictureFormat::I420, 4, 2);
        let mut decoder = codecs.create_video_decoder(&avc()).unwrap();
        assert!(decoder.decode(&idr(1)).is_err());

        let mut primed = avc().annexb_headers();
        primed.extend_from_slice(&idr(2));
        let picture = decoder.decode(&primed).unwrap().unwrap();
        assert_eq!(picture.planes.len(), 3);
        assert_eq!(picture.planes[0].data[0], 0x82);

        // parameter sets persist for the decoder's lifetime
        assert!(decoder.decode(&idr(3)).unwrap().is_some());
        assert_eq!(codecs.inputs_with_parameter_sets(), 1);
    }

    #[test]
    fn test_reorder_delay_holds_pictures() {
        let codecs = NullCodecs::new(PictureFormat::Nv12, 4, 2).with_reorder_delay(1);
        let mut decoder = codecs.create_video_decoder(&avc()).unwrap();
        let mut first = avc().annexb_headers();
        first.extend_from_slice(&idr(1));
        assert!(decoder.decode(&first).unwrap().is_none());
        assert_eq!(decoder.decode(&idr(2)).unwrap().unwrap().planes[0].data[0], 0x81);
    }

    #[test]
    fn test_injected_failures() {
        let codecs = NullCodecs::new(PictureFormat::I420, 2, 2);
        let mut decoder = codecs.create_video_decoder(&avc()).unwrap();
        codecs.fail_next(1);
        let mut au = avc().annexb_headers();
        au.extend_from_slice(&idr(0));
        assert!(decoder.decode(&au).is_err());
        assert!(decoder.decode(&au).is_ok());
    }

    #[test]
    fn test_audio_stop_marks_processed() {
        let audio = NullAudio::new();
        let source = audio
            .source_add(&SourceDesc {
                info: AudioInfo {
                    sample_rate: 48000,
                    channels: 2,
                    bits_per_sample: 16,
                },
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
            })
            .unwrap();
        let buffer = audio.buffer_create().unwrap();
        audio.queue_buffer(source, buffer);
        assert_eq!(audio.queued_buffers_count(source), 1);

        audio.source_stop(source);
        assert_eq!(audio.queued_buffers_count(source), 0);
        assert_eq!(audio.processed_buffers_count(source), 1);
        audio.dequeue_processed_buffers(source);
        assert_eq!(audio.processed_buffers_count(source), 0);
    }
}
