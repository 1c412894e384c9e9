//! CPU frame format conversion.
//!
//! Decoded pictures arrive with arbitrary plane strides. Before staging
//! they are repacked into the tight layout the GPU expects for their
//! [`PixelFormat`]: planar I420 is interleaved to YUY2, every other format
//! is copied row by row at the GPU row pitch.

use crate::backend::{DecodedPicture, PictureFormat, PixelFormat};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("Frame has zero size")]
    Empty,

    #[error("{format:?} needs {expected} planes, got {got}")]
    PlaneCount {
        format: PictureFormat,
        expected: usize,
        got: usize,
    },

    #[error("Plane {plane} stride {stride} is narrower than a {row_bytes} byte row")]
    Stride {
        plane: usize,
        stride: usize,
        row_bytes: usize,
    },

    #[error("Plane {plane} holds {len} bytes, {needed} required")]
    PlaneTooSmall {
        plane: usize,
        needed: usize,
        len: usize,
    },
}

/// GPU-side layout a decoded picture format is staged in.
pub fn staged_format(format: PictureFormat) -> PixelFormat {
    match format {
        PictureFormat::I420 | PictureFormat::Yuy2 => PixelFormat::Yuy2,
        PictureFormat::Nv12 => PixelFormat::Nv12,
        PictureFormat::Rgba8 => PixelFormat::Rgba8,
        PictureFormat::Bgra8 => PixelFormat::Bgra8,
    }
}

/// Bytes per YUY2 row: one four-byte macropixel per pixel pair, the last
/// pair padded for odd widths.
pub fn yuy2_row_pitch(width: u32) -> usize {
    PixelFormat::Yuy2.row_pitch(width)
}

/// Interleave planar 4:2:0 into YUY2, writing `[Y0, U, Y1, V]` per pixel
/// pair. Both luma rows of a chroma row pair share that chroma row. For odd
/// widths the last luma sample is repeated.
///
/// `out` is cleared and refilled; its allocation is reused.
pub fn convert_yuv_to_packed_yuy2(
    planes: [&[u8]; 3],
    strides: [usize; 3],
    width: u32,
    height: u32,
    out: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    if width == 0 || height == 0 {
        return Err(ConvertError::Empty);
    }
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    check_plane(0, planes[0], strides[0], w, h)?;
    check_plane(1, planes[1], strides[1], cw, ch)?;
    check_plane(2, planes[2], strides[2], cw, ch)?;

    let pitch = yuy2_row_pitch(width);
    out.clear();
    out.resize(pitch * h, 0);

    for (y, row) in out.chunks_exact_mut(pitch).enumerate() {
        let luma = &planes[0][y * strides[0]..][..w];
        let u = &planes[1][(y / 2) * strides[1]..][..cw];
        let v = &planes[2][(y / 2) * strides[2]..][..cw];

        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let y0 = luma[2 * x];
            let y1 = luma.get(2 * x + 1).copied().unwrap_or(y0);
            px.copy_from_slice(&[y0, u[x], y1, v[x]]);
        }
    }
    Ok(())
}

/// Pack `picture` into `out` in its staged layout and return that layout.
pub fn pack_picture(picture: &DecodedPicture, out: &mut Vec<u8>) -> Result<PixelFormat, ConvertError> {
    if picture.width == 0 || picture.height == 0 {
        return Err(ConvertError::Empty);
    }
    let (w, h) = (picture.width as usize, picture.height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let format = staged_format(picture.format);
    let pitch = format.row_pitch(picture.width);

    let expected = match picture.format {
        PictureFormat::I420 => 3,
        PictureFormat::Nv12 => 2,
        _ => 1,
    };
    if picture.planes.len() != expected {
        return Err(ConvertError::PlaneCount {
            format: picture.format,
            expected,
            got: picture.planes.len(),
        });
    }
    let p = &picture.planes;

    match picture.format {
        PictureFormat::I420 => {
            convert_yuv_to_packed_yuy2(
                [&p[0].data, &p[1].data, &p[2].data],
                [p[0].stride, p[1].stride, p[2].stride],
                picture.width,
                picture.height,
                out,
            )?;
        }
        PictureFormat::Nv12 => {
            out.clear();
            copy_rows(0, &p[0].data, p[0].stride, w, h, pitch, out)?;
            copy_rows(1, &p[1].data, p[1].stride, cw * 2, ch, pitch, out)?;
        }
        PictureFormat::Yuy2 | PictureFormat::Rgba8 | PictureFormat::Bgra8 => {
            out.clear();
            copy_rows(0, &p[0].data, p[0].stride, pitch, h, pitch, out)?;
        }
    }
    Ok(format)
}

fn check_plane(
    plane: usize,
    data: &[u8],
    stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<(), ConvertError> {
    if stride < row_bytes {
        return Err(ConvertError::Stride {
            plane,
            stride,
            row_bytes,
        });
    }
    let needed = stride * (rows - 1) + row_bytes;
    if data.len() < needed {
        return Err(ConvertError::PlaneTooSmall {
            plane,
            needed,
            len: data.len(),
        });
    }
    Ok(())
}

/// Append `rows` rows of `row_bytes` each, zero-padded to `pitch`.
fn copy_rows(
    plane: usize,
    data: &[u8],
    stride: usize,
    row_bytes: usize,
    rows: usize,
    pitch: usize,
    out: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    check_plane(plane, data, stride, row_bytes, rows)?;
    out.reserve(pitch * rows);
    for y in 0..rows {
        out.extend_from_slice(&data[y * stride..][..row_bytes]);
        out.resize(out.len() + pitch.saturating_sub(row_bytes), 0);
    }
    Ok(())
}
