// SPDX-License-Identifier: GPL-3.0-only

//! Frame to intensity conversion
//!
//! Detectors operate on intensity only, so conversion is a byte-for-byte copy
//! of the luminance plane with row padding removed. Chrominance is never read.

use super::types::IntensityBuffer;
use crate::capture::Frame;
use crate::errors::FrameError;
use tracing::trace;

/// Extract the luminance plane of a 4:2:0 frame
///
/// # Returns
/// * `Ok(IntensityBuffer)` - exactly `width * height` bytes, stride == width
/// * `Err(FrameError::UnsupportedFormat)` - not a planar 4:2:0 layout, missing
///   planes, or a luminance plane whose size does not match its dimensions
pub fn convert(frame: &Frame) -> Result<IntensityBuffer, FrameError> {
    if !frame.format.is_planar_420() {
        return Err(FrameError::UnsupportedFormat(format!(
            "{} is not a planar 4:2:0 format",
            frame.format
        )));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(FrameError::UnsupportedFormat(format!(
            "invalid dimensions {}x{}",
            frame.width, frame.height
        )));
    }
    if frame.planes.len() < frame.format.plane_count() {
        return Err(FrameError::UnsupportedFormat(format!(
            "{} needs {} planes, frame has {}",
            frame.format,
            frame.format.plane_count(),
            frame.planes.len()
        )));
    }

    let luma = &frame.planes[0];
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = luma.stride as usize;
    let bytes_per_pixel = frame.format.primary_plane_bytes_per_pixel();

    if stride < width * bytes_per_pixel {
        return Err(FrameError::UnsupportedFormat(format!(
            "luminance stride {} is smaller than row width {}",
            stride, width
        )));
    }

    // Camera HALs either pad every row or leave the last row unpadded
    let full = stride * height;
    let trimmed = stride * (height - 1) + width * bytes_per_pixel;
    if luma.len() != full && luma.len() != trimmed {
        return Err(FrameError::UnsupportedFormat(format!(
            "luminance plane is {} bytes, expected {} for {}x{} with stride {}",
            luma.len(),
            full,
            width,
            height,
            stride
        )));
    }

    let data = if stride == width {
        luma.data[..width * height].to_vec()
    } else {
        copy_without_stride(&luma.data, width, height, stride)
    };

    trace!(
        sequence = frame.sequence,
        width,
        height,
        stride,
        "Extracted luminance plane"
    );

    Ok(IntensityBuffer {
        width: frame.width,
        height: frame.height,
        data,
        sequence: frame.sequence,
        captured_at: frame.captured_at,
    })
}

/// Copy plane rows without stride padding
fn copy_without_stride(data: &[u8], width: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(width * height);
    for row in data.chunks(stride).take(height) {
        result.extend_from_slice(&row[..width]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PixelFormat, Plane};

    fn frame_with_luma(format: PixelFormat, width: u32, height: u32, luma: Plane) -> Frame {
        let mut frame = Frame::from_luma(
            format,
            width,
            height,
            vec![0; (width * height) as usize],
            9,
        )
        .unwrap();
        frame.planes[0] = luma;
        frame
    }

    #[test]
    fn test_convert_tight_plane() {
        let luma: Vec<u8> = (0..12).collect();
        let frame = Frame::from_luma(PixelFormat::NV12, 4, 3, luma.clone(), 5).unwrap();

        let buffer = convert(&frame).unwrap();
        assert_eq!((buffer.width, buffer.height), (4, 3));
        assert_eq!(buffer.data, luma);
        assert_eq!(buffer.sequence, 5);
    }

    #[test]
    fn test_convert_removes_stride_padding() {
        // 2x2 luma with 2 bytes of row padding, last row padded too
        let padded = vec![1, 2, 0xEE, 0xEE, 3, 4, 0xEE, 0xEE];
        let frame = frame_with_luma(PixelFormat::I420, 2, 2, Plane::new(padded, 4));
        assert_eq!(convert(&frame).unwrap().data, vec![1, 2, 3, 4]);

        // Last row unpadded
        let trimmed = vec![1, 2, 0xEE, 0xEE, 3, 4];
        let frame = frame_with_luma(PixelFormat::NV21, 2, 2, Plane::new(trimmed, 4));
        assert_eq!(convert(&frame).unwrap().data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_convert_rejects_malformed_luma() {
        for len in [0usize, 11, 13, 24] {
            let frame = frame_with_luma(PixelFormat::NV12, 4, 3, Plane::new(vec![0u8; len], 4));
            assert!(
                matches!(convert(&frame), Err(FrameError::UnsupportedFormat(_))),
                "length {} should be rejected",
                len
            );
        }

        let frame = frame_with_luma(PixelFormat::NV12, 4, 3, Plane::new(vec![0u8; 9], 3));
        assert!(matches!(convert(&frame), Err(FrameError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_convert_rejects_other_layouts() {
        let yuyv = Frame::new(2, 2, PixelFormat::YUYV, vec![Plane::new(vec![0u8; 8], 4)], 0);
        assert!(matches!(convert(&yuyv), Err(FrameError::UnsupportedFormat(_))));

        let mut missing = Frame::from_luma(PixelFormat::I420, 2, 2, vec![0; 4], 0).unwrap();
        missing.planes.truncate(1);
        assert!(matches!(convert(&missing), Err(FrameError::UnsupportedFormat(_))));
    }
}
