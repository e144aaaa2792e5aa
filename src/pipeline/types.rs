// SPDX-License-Identifier: GPL-3.0-only

//! Core types flowing between pipeline stages

use image::{GrayImage, RgbaImage};
use std::time::Instant;

/// Single-channel intensity image, one byte per pixel, stride == width
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityBuffer {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, exactly `width * height` bytes
    pub data: Vec<u8>,
    /// Sequence number of the frame this buffer was extracted from
    pub sequence: u64,
    /// Capture time of that frame
    pub captured_at: Instant,
}

impl IntensityBuffer {
    /// Wrap tightly packed intensity bytes
    ///
    /// Returns `None` if `data` is not exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Copy into an `image` grayscale image
    pub fn to_gray_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// A 2D point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A detected marker quadrilateral
///
/// Corners are in the detector's winding order. Corner 0 and corner 2 are
/// diagonally opposite; the overlay draws its rectangle between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Quad corners in detector order
    pub corners: [Point2; 4],
    /// Decoded tag id, if the detector reports one
    pub id: Option<u32>,
    /// Bit errors corrected while decoding
    pub hamming: Option<u32>,
    /// Decoding confidence reported by the detector
    pub decision_margin: Option<f32>,
    /// Tag center, if the detector reports one
    pub center: Option<Point2>,
}

impl Detection {
    /// Create a detection from its four corners
    pub fn new(corners: [Point2; 4]) -> Self {
        Self {
            corners,
            id: None,
            hamming: None,
            decision_margin: None,
            center: None,
        }
    }

    /// Create a detection from the flat `[x0, y0, x1, y1, x2, y2, x3, y3]`
    /// layout native detector bindings return
    pub fn from_flat_corners(p: [f64; 8]) -> Self {
        Self::new([
            Point2::new(p[0], p[1]),
            Point2::new(p[2], p[3]),
            Point2::new(p[4], p[5]),
            Point2::new(p[6], p[7]),
        ])
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// The two diagonally opposite corners (0 and 2)
    pub fn diagonal(&self) -> (Point2, Point2) {
        (self.corners[0], self.corners[2])
    }
}

/// Ordered detections for one frame, possibly empty
///
/// Order is the detector's output order and is preserved through rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// First detection carrying `id`
    pub fn find_by_id(&self, id: u32) -> Option<&Detection> {
        self.detections.iter().find(|d| d.id == Some(id))
    }
}

impl From<Vec<Detection>> for DetectionResult {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionResult {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Annotated, display-oriented color image ready for the display sink
#[derive(Debug, Clone, PartialEq)]
pub struct PresentableImage {
    /// RGBA pixels
    pub image: RgbaImage,
    /// Sequence number of the source frame
    pub sequence: u64,
    /// Capture time of the source frame
    pub captured_at: Instant,
    /// Number of detections drawn
    pub detection_count: usize,
}

impl PresentableImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_corners_keep_diagonal() {
        let det = Detection::from_flat_corners([10.0, 10.0, 50.0, 10.0, 50.0, 50.0, 10.0, 50.0]);
        let (a, b) = det.diagonal();
        assert_eq!(a, Point2::new(10.0, 10.0));
        assert_eq!(b, Point2::new(50.0, 50.0));
    }

    #[test]
    fn test_result_lookup_and_order() {
        let result = DetectionResult::from(vec![
            Detection::from_flat_corners([0.0; 8]).with_id(7),
            Detection::from_flat_corners([1.0; 8]).with_id(3),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.find_by_id(3).map(|d| d.corners[0].x), Some(1.0));
        assert!(result.find_by_id(9).is_none());
        let ids: Vec<_> = result.iter().filter_map(|d| d.id).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn test_intensity_buffer_size_check() {
        assert!(IntensityBuffer::new(4, 3, vec![0; 12], 0).is_some());
        assert!(IntensityBuffer::new(4, 3, vec![0; 11], 0).is_none());
    }
}
