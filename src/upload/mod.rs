//! GPU frame upload.
//!
//! A player stages converted frames into a last-write-wins slot on its
//! ticking thread; a single in-flight [`UploadTask`] per player pushes the
//! newest staged frame into the frame texture on the renderer's upload
//! queue. The task holds only a weak back-reference to the player's upload
//! state, so destroying a player turns any queued task into a no-op.

mod runtime;
mod task;

pub use runtime::QueuedUploadRuntime;
pub use task::{TaskResult, UploadTask};
pub(crate) use task::UploadShared;

use crate::backend::{GpuDevice, PictureFormat, PixelFormat};
use crate::convert::staged_format;

/// How frames travel from decoder output to the frame texture.
///
/// Chosen once when media is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePath {
    /// Layout frames are staged in.
    pub staged: PixelFormat,
    /// Format of the frame texture.
    pub texture: PixelFormat,
}

impl FramePath {
    /// Planar I420 is packed to YUY2 on the CPU. Packed YUY2/NV12 are
    /// expanded to RGBA by the matching decode pipeline when the device has
    /// it, and otherwise uploaded as-is into a texture of their own format.
    /// RGBA/BGRA always upload directly.
    pub fn select(source: PictureFormat, device: &dyn GpuDevice) -> Self {
        let staged = staged_format(source);
        let texture = match staged.decode_pipeline() {
            Some(pipeline) if device.has_pipeline(pipeline) => PixelFormat::Rgba8,
            _ => staged,
        };
        Self { staged, texture }
    }

    pub fn uses_shader(&self) -> bool {
        self.staged.is_packed_video() && self.texture == PixelFormat::Rgba8
    }
}

/// A converted frame waiting in the staging slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFrame {
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Video sample the frame was decoded from.
    pub sample: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullGpu;
    use crate::backend::DecodePipeline;

    #[test]
    fn test_select_with_pipelines() {
        let gpu = NullGpu::new();
        let path = FramePath::select(PictureFormat::I420, &gpu);
        assert_eq!(path.staged, PixelFormat::Yuy2);
        assert_eq!(path.texture, PixelFormat::Rgba8);
        assert!(path.uses_shader());

        let path = FramePath::select(PictureFormat::Nv12, &gpu);
        assert_eq!(path.staged, PixelFormat::Nv12);
        assert!(path.uses_shader());
    }

    #[test]
    fn test_select_without_pipelines() {
        let gpu = NullGpu::with_pipelines(&[DecodePipeline::Yuy2]);
        let path = FramePath::select(PictureFormat::Nv12, &gpu);
        assert_eq!(path.texture, PixelFormat::Nv12);
        assert!(!path.uses_shader());

        let path = FramePath::select(PictureFormat::Bgra8, &gpu);
        assert_eq!(path.staged, PixelFormat::Bgra8);
        assert_eq!(path.texture, PixelFormat::Bgra8);
    }
}
