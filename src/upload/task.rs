use super::StagedFrame;
use crate::backend::{
    BufferDesc, BufferHandle, DecodePipeline, GpuDevice, GpuError, GpuResource, PixelFormat, TextureDesc,
    TextureHandle, TextureUpdate, UploadRuntime,
};
use crate::error::PlayerError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Outcome of one upload task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    /// A frame reached the texture.
    Ok,
    /// The player is gone or there was nothing to upload.
    MissingResources,
    /// The device rejected the upload or the formats do not line up.
    Failed,
}

/// One asynchronous upload of the newest staged frame.
///
/// Created by the player, executed by an [`UploadRuntime`].
pub struct UploadTask {
    id: u64,
    player: Mutex<Option<Weak<UploadShared>>>,
}

impl std::fmt::Debug for UploadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTask")
            .field("id", &self.id)
            .field("attached", &self.player.lock().is_some())
            .finish()
    }
}

impl UploadTask {
    fn new(id: u64, player: Weak<UploadShared>) -> Self {
        Self {
            id,
            player: Mutex::new(Some(player)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn player(&self) -> Option<Arc<UploadShared>> {
        self.player.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Clear the back-reference. Later steps do nothing.
    pub fn detach(&self) {
        *self.player.lock() = None;
    }

    /// Whether this task would write `resource`.
    pub fn references(&self, resource: GpuResource) -> bool {
        self.player()
            .is_some_and(|player| player.resources.lock().contains(resource))
    }

    /// Execute the task against the renderer's device and report completion
    /// to the owning player.
    pub fn run(&self, gpu: &dyn GpuDevice) -> TaskResult {
        let Some(player) = self.player() else {
            tracing::trace!(task = self.id, "Upload task detached");
            return TaskResult::MissingResources;
        };
        let result = player.upload_latest(gpu);
        player.on_completed(self, result);
        result
    }
}

#[derive(Debug, Default)]
struct FrameResources {
    texture: Option<(TextureHandle, TextureDesc)>,
    staging: Option<(BufferHandle, BufferDesc)>,
}

impl FrameResources {
    fn contains(&self, resource: GpuResource) -> bool {
        match resource {
            GpuResource::Texture(t) => self.texture.is_some_and(|(h, _)| h == t),
            GpuResource::Buffer(b) => self.staging.is_some_and(|(h, _)| h == b),
        }
    }
}

/// Upload state shared between a player and its in-flight task.
pub(crate) struct UploadShared {
    gpu: Arc<dyn GpuDevice>,
    texture_format: PixelFormat,
    staged: Mutex<Option<StagedFrame>>,
    recycled: Mutex<Option<Vec<u8>>>,
    resources: Mutex<FrameResources>,
    in_flight: Mutex<Option<Arc<UploadTask>>>,
    next_task: AtomicU64,
    frames_count: AtomicU64,
    misconfiguration_logged: AtomicBool,
}

impl std::fmt::Debug for UploadShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadShared")
            .field("texture_format", &self.texture_format)
            .field("resources", &*self.resources.lock())
            .field("frames_count", &self.frames_count())
            .finish_non_exhaustive()
    }
}

impl UploadShared {
    pub(crate) fn new(gpu: Arc<dyn GpuDevice>, texture_format: PixelFormat) -> Self {
        Self {
            gpu,
            texture_format,
            staged: Mutex::new(None),
            recycled: Mutex::new(None),
            resources: Mutex::new(FrameResources::default()),
            in_flight: Mutex::new(None),
            next_task: AtomicU64::new(1),
            frames_count: AtomicU64::new(0),
            misconfiguration_logged: AtomicBool::new(false),
        }
    }

    pub(crate) fn frames_count(&self) -> u64 {
        self.frames_count.load(Ordering::Acquire)
    }

    pub(crate) fn texture(&self) -> Option<TextureHandle> {
        self.resources.lock().texture.map(|(h, _)| h)
    }

    pub(crate) fn has_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// A byte buffer for the next conversion, reusing a consumed frame's
    /// allocation when one is available.
    pub(crate) fn take_buffer(&self) -> Vec<u8> {
        self.recycled.lock().take().unwrap_or_default()
    }

    fn recycle(&self, data: Vec<u8>) {
        self.recycled.lock().get_or_insert(data);
    }

    /// Replace the staging slot with `frame`.
    pub(crate) fn stage(&self, frame: StagedFrame) {
        if let Some(old) = self.staged.lock().replace(frame) {
            self.recycle(old.data);
        }
    }

    /// Start an upload task if a frame is staged and none is in flight.
    pub(crate) fn pump(self: &Arc<Self>, uploads: &dyn UploadRuntime) {
        if self.staged.lock().is_none() {
            return;
        }
        let task = {
            let mut in_flight = self.in_flight.lock();
            if in_flight.is_some() {
                return;
            }
            let id = self.next_task.fetch_add(1, Ordering::Relaxed);
            let task = Arc::new(UploadTask::new(id, Arc::downgrade(self)));
            *in_flight = Some(Arc::clone(&task));
            task
        };
        tracing::trace!(task = task.id(), "Starting upload task");
        uploads.start(task);
    }

    /// Detach and cancel the in-flight task, if any.
    pub(crate) fn cancel_in_flight(&self, uploads: &dyn UploadRuntime) {
        let task = self.in_flight.lock().take();
        if let Some(task) = task {
            task.detach();
            uploads.cancel(&task);
        }
    }

    fn on_completed(&self, task: &UploadTask, result: TaskResult) {
        {
            let mut in_flight = self.in_flight.lock();
            if in_flight
                .as_ref()
                .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), task))
            {
                *in_flight = None;
            }
        }
        if result == TaskResult::Ok {
            self.frames_count.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn upload_latest(&self, gpu: &dyn GpuDevice) -> TaskResult {
        let Some(frame) = self.staged.lock().take() else {
            return TaskResult::MissingResources;
        };

        let pipeline = frame.format.decode_pipeline();
        let result = match pipeline {
            Some(pipeline)
                if self.texture_format == PixelFormat::Rgba8 && gpu.has_pipeline(pipeline) =>
            {
                self.upload_with_shader(gpu, &frame, pipeline)
            }
            _ if frame.format == self.texture_format => self.upload_direct(gpu, &frame),
            _ => {
                if !self.misconfiguration_logged.swap(true, Ordering::Relaxed) {
                    let err = PlayerError::UploadMisconfiguration {
                        staged: frame.format,
                        texture: self.texture_format,
                    };
                    tracing::warn!(error = %err, "Dropping staged frame");
                }
                self.recycle(frame.data);
                return TaskResult::Failed;
            }
        };

        let sample = frame.sample;
        self.recycle(frame.data);
        match result {
            Ok(()) => TaskResult::Ok,
            Err(e) => {
                tracing::warn!(sample, error = %e, "Frame upload failed");
                TaskResult::Failed
            }
        }
    }

    fn upload_direct(&self, gpu: &dyn GpuDevice, frame: &StagedFrame) -> Result<(), GpuError> {
        let texture = self.ensure_texture(gpu, frame.width, frame.height)?;
        gpu.update_texture(
            texture,
            TextureUpdate {
                mip: 0,
                slice: 0,
                data: &frame.data,
                row_pitch: frame.format.row_pitch(frame.width),
                slice_pitch: frame.format.slice_pitch(frame.width, frame.height),
            },
        )
    }

    fn upload_with_shader(
        &self,
        gpu: &dyn GpuDevice,
        frame: &StagedFrame,
        pipeline: DecodePipeline,
    ) -> Result<(), GpuError> {
        let texture = self.ensure_texture(gpu, frame.width, frame.height)?;
        let staging = self.ensure_staging(gpu, frame.data.len(), frame.format)?;
        gpu.update_buffer(staging, &frame.data)?;
        gpu.set_render_target(texture)?;
        gpu.bind_shader_resource(0, staging)?;
        gpu.set_pipeline_state(pipeline)?;
        gpu.draw_fullscreen_triangle()
    }

    /// The frame texture, reallocated when its descriptor no longer matches.
    fn ensure_texture(
        &self,
        gpu: &dyn GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<TextureHandle, GpuError> {
        let desc = TextureDesc {
            width,
            height,
            format: self.texture_format,
        };
        let mut resources = self.resources.lock();
        match resources.texture {
            Some((handle, current)) if current == desc => return Ok(handle),
            Some((handle, _)) => {
                gpu.destroy_texture(handle);
                resources.texture = None;
            }
            None => {}
        }

        let handle = gpu.create_texture(&desc)?;
        tracing::debug!(width, height, format = ?desc.format, "Allocated frame texture");
        resources.texture = Some((handle, desc));
        Ok(handle)
    }

    fn ensure_staging(
        &self,
        gpu: &dyn GpuDevice,
        size: usize,
        format: PixelFormat,
    ) -> Result<BufferHandle, GpuError> {
        let desc = BufferDesc { size, format };
        let mut resources = self.resources.lock();
        match resources.staging {
            Some((handle, current)) if current == desc => return Ok(handle),
            Some((handle, _)) => {
                gpu.destroy_buffer(handle);
                resources.staging = None;
            }
            None => {}
        }

        let handle = gpu.create_buffer(&desc)?;
        resources.staging = Some((handle, desc));
        Ok(handle)
    }
}

impl Drop for UploadShared {
    fn drop(&mut self) {
        let resources = self.resources.get_mut();
        if let Some((texture, _)) = resources.texture.take() {
            self.gpu.destroy_texture(texture);
        }
        if let Some((buffer, _)) = resources.staging.take() {
            self.gpu.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullGpu;
    use crate::upload::QueuedUploadRuntime;

    fn frame(format: PixelFormat, sample: u32) -> StagedFrame {
        StagedFrame {
            data: vec![sample as u8; format.slice_pitch(4, 2)],
            format,
            width: 4,
            height: 2,
            sample,
        }
    }

    fn setup(texture: PixelFormat) -> (Arc<NullGpu>, QueuedUploadRuntime, Arc<UploadShared>) {
        let gpu = Arc::new(NullGpu::new());
        let shared = Arc::new(UploadShared::new(gpu.clone(), texture));
        (gpu, QueuedUploadRuntime::new(), shared)
    }

    #[test]
    fn test_single_task_in_flight() {
        let (gpu, runtime, shared) = setup(PixelFormat::Rgba8);
        shared.stage(frame(PixelFormat::Yuy2, 1));
        shared.pump(&runtime);
        shared.stage(frame(PixelFormat::Yuy2, 2));
        shared.pump(&runtime);
        assert_eq!(runtime.pending(), 1);
        assert!(shared.has_in_flight());

        assert_eq!(runtime.flush(gpu.as_ref()), 1);
        assert!(!shared.has_in_flight());
        assert_eq!(shared.frames_count(), 1);
        // the newer frame replaced the older one, nothing is left
        shared.pump(&runtime);
        assert_eq!(runtime.pending(), 0);
        assert_eq!(gpu.draws(), 1);
    }

    #[test]
    fn test_direct_upload_and_resize() {
        let (gpu, runtime, shared) = setup(PixelFormat::Nv12);
        shared.stage(frame(PixelFormat::Nv12, 1));
        shared.pump(&runtime);
        runtime.flush(gpu.as_ref());
        let first = shared.texture().unwrap();

        shared.stage(StagedFrame {
            data: vec![0; PixelFormat::Nv12.slice_pitch(8, 4)],
            width: 8,
            height: 4,
            ..frame(PixelFormat::Nv12, 2)
        });
        shared.pump(&runtime);
        runtime.flush(gpu.as_ref());

        let second = shared.texture().unwrap();
        assert_ne!(first, second);
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(gpu.texture_updates(), 2);
        assert_eq!(shared.frames_count(), 2);
    }

    #[test]
    fn test_misconfiguration_drops_frame() {
        let (gpu, runtime, shared) = setup(PixelFormat::Bgra8);
        shared.stage(frame(PixelFormat::Rgba8, 1));
        shared.pump(&runtime);
        runtime.flush(gpu.as_ref());
        assert_eq!(shared.frames_count(), 0);
        assert!(!shared.has_in_flight());
        assert!(shared.texture().is_none());
    }

    #[test]
    fn test_detached_task_is_noop() {
        let (gpu, runtime, shared) = setup(PixelFormat::Rgba8);
        shared.stage(frame(PixelFormat::Rgba8, 1));
        shared.pump(&runtime);
        let task = shared.in_flight.lock().clone().unwrap();

        drop(shared);
        assert_eq!(task.run(gpu.as_ref()), TaskResult::MissingResources);
        assert_eq!(gpu.texture_updates(), 0);
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn test_drop_releases_resources() {
        let (gpu, runtime, shared) = setup(PixelFormat::Rgba8);
        shared.stage(frame(PixelFormat::Yuy2, 1));
        shared.pump(&runtime);
        runtime.flush(gpu.as_ref());
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(gpu.live_buffers(), 1);

        drop(shared);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn test_consumed_buffers_are_recycled() {
        let (gpu, runtime, shared) = setup(PixelFormat::Rgba8);
        shared.stage(frame(PixelFormat::Rgba8, 1));
        shared.pump(&runtime);
        runtime.flush(gpu.as_ref());
        assert_eq!(shared.take_buffer().len(), PixelFormat::Rgba8.slice_pitch(4, 2));
        assert!(shared.take_buffer().is_empty());
    }
}
