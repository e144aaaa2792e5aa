// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame sources

//! Frame and format types shared by frame sources and the pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Pixel format tag of a captured frame
///
/// Camera HALs deliver 4:2:0 frames in one of several plane arrangements.
/// Only the luminance plane is consumed by the pipeline, but the full layout
/// is kept so malformed buffers can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    /// Default preview format of most mobile camera stacks
    NV21,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// YV12 - Planar 4:2:0 with V before U
    YV12,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
}

impl PixelFormat {
    /// Check if this format is a 4:2:0 luminance/chrominance layout with a
    /// standalone luminance plane
    pub fn is_planar_420(&self) -> bool {
        matches!(self, Self::NV12 | Self::NV21 | Self::I420 | Self::YV12)
    }

    /// Number of planes a frame of this format carries
    pub fn plane_count(&self) -> usize {
        match self {
            Self::NV12 | Self::NV21 => 2,
            Self::I420 | Self::YV12 => 3,
            Self::YUYV | Self::Gray8 | Self::RGBA => 1,
        }
    }

    /// Bytes per pixel of the first plane
    ///
    /// For the 4:2:0 formats this is the luminance plane.
    pub fn primary_plane_bytes_per_pixel(&self) -> usize {
        match self {
            Self::NV12 | Self::NV21 | Self::I420 | Self::YV12 | Self::Gray8 => 1,
            Self::YUYV => 2,
            Self::RGBA => 4,
        }
    }

    /// Format name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NV12 => "NV12",
            Self::NV21 => "NV21",
            Self::I420 => "I420",
            Self::YV12 => "YV12",
            Self::YUYV => "YUYV",
            Self::Gray8 => "GRAY8",
            Self::RGBA => "RGBA",
        }
    }

    /// Parse format from a format name (GStreamer / FourCC / Android spelling)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "NV12" => Some(Self::NV12),
            "NV21" => Some(Self::NV21),
            "I420" | "YUV_420_888" | "IYUV" => Some(Self::I420),
            "YV12" => Some(Self::YV12),
            "YUYV" | "YUY2" => Some(Self::YUYV),
            "GRAY8" | "GREY" | "Y8" => Some(Self::Gray8),
            "RGBA" => Some(Self::RGBA),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors on mobile devices are usually mounted at 90° or 270°
/// relative to the display. The value is a property of the hardware, not of
/// frame content, and is applied to every presented image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360)
    ///
    /// Returns `None` when the angle is not a multiple of 90.
    pub fn from_degrees_int(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(SensorRotation::None),
            90 => Some(SensorRotation::Rotate90),
            180 => Some(SensorRotation::Rotate180),
            270 => Some(SensorRotation::Rotate270),
            _ => None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One plane of a frame: pixel bytes plus row stride
#[derive(Clone)]
pub struct Plane {
    /// Plane bytes (shared, never mutated after capture)
    pub data: Arc<[u8]>,
    /// Bytes per row, may include padding
    pub stride: u32,
}

impl Plane {
    pub fn new(data: impl Into<Arc<[u8]>>, stride: u32) -> Self {
        Self {
            data: data.into(),
            stride,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plane")
            .field("bytes", &self.data.len())
            .field("stride", &self.stride)
            .finish()
    }
}

/// A single frame from a frame source
///
/// Immutable once produced. Cloning is cheap: plane bytes are reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Pixel format of the planes
    pub format: PixelFormat,
    /// Planes in format order (luminance first for 4:2:0 formats)
    pub planes: Vec<Plane>,
    /// Monotonic frame number assigned by the source
    pub sequence: u64,
    /// Timestamp when the frame was captured
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: Vec<Plane>, sequence: u64) -> Self {
        Self {
            width,
            height,
            format,
            planes,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Build a 4:2:0 frame from a tightly packed luminance buffer
    ///
    /// Chrominance planes are filled with the neutral value 128 in the
    /// arrangement `format` requires. Returns `None` for non-4:2:0 formats or
    /// when `luma` is not exactly `width * height` bytes.
    pub fn from_luma(
        format: PixelFormat,
        width: u32,
        height: u32,
        luma: Vec<u8>,
        sequence: u64,
    ) -> Option<Self> {
        if !format.is_planar_420() || luma.len() != width as usize * height as usize {
            return None;
        }

        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2) as usize;

        let mut planes = vec![Plane::new(luma, width)];
        match format {
            PixelFormat::NV12 | PixelFormat::NV21 => {
                let stride = chroma_width * 2;
                planes.push(Plane::new(vec![128u8; stride as usize * chroma_height], stride));
            }
            _ => {
                for _ in 0..2 {
                    planes.push(Plane::new(
                        vec![128u8; chroma_width as usize * chroma_height],
                        chroma_width,
                    ));
                }
            }
        }

        Some(Self::new(width, height, format, planes, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(SensorRotation::from_degrees_int(0), Some(SensorRotation::None));
        assert_eq!(SensorRotation::from_degrees_int(90), Some(SensorRotation::Rotate90));
        assert_eq!(SensorRotation::from_degrees_int(-90), Some(SensorRotation::Rotate270));
        assert_eq!(SensorRotation::from_degrees_int(450), Some(SensorRotation::Rotate90));
        assert_eq!(SensorRotation::from_degrees_int(45), None);
        assert!(SensorRotation::Rotate270.swaps_dimensions());
        assert!(!SensorRotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_pixel_format_names() {
        assert_eq!(PixelFormat::from_name("YUV_420_888"), Some(PixelFormat::I420));
        assert_eq!(PixelFormat::from_name("NV21"), Some(PixelFormat::NV21));
        assert_eq!(PixelFormat::from_name("MJPG"), None);
        assert!(PixelFormat::NV12.is_planar_420());
        assert!(!PixelFormat::YUYV.is_planar_420());
    }

    #[test]
    fn test_from_luma_layouts() {
        let nv21 = Frame::from_luma(PixelFormat::NV21, 5, 3, vec![0; 15], 1).unwrap();
        assert_eq!(nv21.planes.len(), 2);
        // 5x3 luma -> 3x2 chroma samples, interleaved
        assert_eq!(nv21.planes[1].stride, 6);
        assert_eq!(nv21.planes[1].len(), 12);

        let i420 = Frame::from_luma(PixelFormat::I420, 4, 4, vec![0; 16], 2).unwrap();
        assert_eq!(i420.planes.len(), 3);
        assert_eq!(i420.planes[2].len(), 4);

        assert!(Frame::from_luma(PixelFormat::NV12, 4, 4, vec![0; 15], 3).is_none());
        assert!(Frame::from_luma(PixelFormat::YUYV, 4, 4, vec![0; 16], 4).is_none());
    }
}
