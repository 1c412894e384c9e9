//! GPU device and upload-runtime capabilities.

use crate::upload::UploadTask;
use std::sync::Arc;

/// Opaque texture handle issued by a [`GpuDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque buffer handle issued by a [`GpuDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// A resource an upload task may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

/// Pixel layouts understood by textures and typed buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    /// Packed 4:2:2, two pixels per four bytes.
    Yuy2,
    /// 4:2:0 with a full-size luma plane and an interleaved half-size chroma plane.
    Nv12,
}

impl PixelFormat {
    /// Packed video layouts that the decode pipelines can expand to RGBA.
    pub fn is_packed_video(self) -> bool {
        matches!(self, Self::Yuy2 | Self::Nv12)
    }

    /// Bytes per row for a frame `width` pixels wide.
    pub fn row_pitch(self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Rgba8 | Self::Bgra8 => width * 4,
            Self::Yuy2 => width.div_ceil(2) * 4,
            // luma row; the interleaved chroma rows share it
            Self::Nv12 => width.div_ceil(2) * 2,
        }
    }

    /// Bytes for a whole frame.
    pub fn slice_pitch(self, width: u32, height: u32) -> usize {
        let rows = height as usize;
        match self {
            Self::Nv12 => self.row_pitch(width) * rows + self.row_pitch(width) * rows.div_ceil(2),
            _ => self.row_pitch(width) * rows,
        }
    }

    /// The pipeline that expands this format, if it is a packed video format.
    pub fn decode_pipeline(self) -> Option<DecodePipeline> {
        match self {
            Self::Yuy2 => Some(DecodePipeline::Yuy2),
            Self::Nv12 => Some(DecodePipeline::Nv12),
            Self::Rgba8 | Self::Bgra8 => None,
        }
    }
}

/// Fullscreen pixel pipelines that read a packed source buffer and write RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodePipeline {
    Yuy2,
    Nv12,
}

/// 2D texture descriptor. Textures are created shader-readable and
/// render-targetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Dynamic typed buffer descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size: usize,
    pub format: PixelFormat,
}

/// One texture sub-resource write.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpdate<'a> {
    pub mip: u32,
    pub slice: u32,
    pub data: &'a [u8],
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("Resource creation failed: {0}")]
    CreateFailed(String),

    #[error("Unknown resource {0:?}")]
    InvalidResource(GpuResource),

    #[error("Write of {got} bytes does not fit {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("Pipeline {0:?} is not available")]
    MissingPipeline(DecodePipeline),

    #[error("Command rejected: {0}")]
    Command(String),

    #[error("Device lost")]
    DeviceLost,
}

/// GPU device operations used by the player and its upload tasks.
///
/// Resource creation may happen on the ticking thread; command recording
/// (`set_*`, `bind_*`, `draw_*`) happens only inside upload tasks.
pub trait GpuDevice: Send + Sync {
    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandle, GpuError>;
    fn destroy_texture(&self, texture: TextureHandle);

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle, GpuError>;
    fn destroy_buffer(&self, buffer: BufferHandle);

    fn update_texture(&self, texture: TextureHandle, update: TextureUpdate<'_>)
        -> Result<(), GpuError>;
    fn update_buffer(&self, buffer: BufferHandle, data: &[u8]) -> Result<(), GpuError>;

    /// Whether the device carries the given decode pipeline.
    fn has_pipeline(&self, pipeline: DecodePipeline) -> bool;

    fn set_render_target(&self, texture: TextureHandle) -> Result<(), GpuError>;
    fn bind_shader_resource(&self, slot: u32, buffer: BufferHandle) -> Result<(), GpuError>;
    fn set_pipeline_state(&self, pipeline: DecodePipeline) -> Result<(), GpuError>;
    fn draw_fullscreen_triangle(&self) -> Result<(), GpuError>;
}

/// The renderer's asynchronous upload queue.
pub trait UploadRuntime: Send + Sync {
    /// Enqueue a task.
    fn start(&self, task: Arc<UploadTask>);

    /// Drop a task that has not run yet; a running task finishes its step.
    fn cancel(&self, task: &Arc<UploadTask>);

    /// Whether any pending task targets `resource`.
    fn has_reference(&self, resource: GpuResource) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuy2_pitch_rounds_odd_widths() {
        assert_eq!(PixelFormat::Yuy2.row_pitch(4), 8);
        assert_eq!(PixelFormat::Yuy2.row_pitch(5), 12);
        assert_eq!(PixelFormat::Yuy2.slice_pitch(5, 3), 36);
    }

    #[test]
    fn test_nv12_slice_includes_chroma() {
        assert_eq!(PixelFormat::Nv12.row_pitch(5), 6);
        // 4x3 luma, 2 chroma rows of 4 bytes
        assert_eq!(PixelFormat::Nv12.slice_pitch(4, 3), 12 + 8);
    }

    #[test]
    fn test_decode_pipeline_mapping() {
        assert_eq!(PixelFormat::Nv12.decode_pipeline(), Some(DecodePipeline::Nv12));
        assert!(PixelFormat::Rgba8.decode_pipeline().is_none());
        assert!(PixelFormat::Yuy2.is_packed_video());
    }
}
