// SPDX-License-Identifier: GPL-3.0-only

//! QR grid detector backend
//!
//! A pure-Rust [`TagDetector`] built on rqrr. QR finder grids are treated as
//! fiducials: each located grid becomes a [`Detection`] whose corners are
//! the grid bounds, and a numeric payload becomes the detection id. Used by
//! the preview harness when no native AprilTag binding is linked in.

use super::detector::TagDetector;
use super::types::{Detection, DetectionResult, Point2};
use crate::config::DetectorConfig;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use std::time::Instant;
use tracing::{debug, trace};

/// Family name this backend answers to
pub const QR_FAMILY: &str = "qr";

/// Processing parameters fixed at initialization
#[derive(Debug, Clone, Copy)]
struct QrParams {
    /// Integer sampling step (1 = full resolution)
    step: u32,
    blur_sigma: f32,
}

/// QR grid detector
#[derive(Debug, Default)]
pub struct QrGridDetector {
    params: Option<QrParams>,
}

impl QrGridDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TagDetector for QrGridDetector {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), String> {
        if config.family != QR_FAMILY {
            return Err(format!(
                "unsupported tag family '{}', this backend only detects '{}'",
                config.family, QR_FAMILY
            ));
        }

        let params = QrParams {
            step: (config.decimation.round() as u32).max(1),
            blur_sigma: config.blur_sigma,
        };
        debug!(
            step = params.step,
            blur_sigma = params.blur_sigma,
            threads = config.thread_hint,
            "QR grid detector ready"
        );
        self.params = Some(params);
        Ok(())
    }

    fn detect(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<DetectionResult, String> {
        let params = self.params.ok_or("detector used before initialization")?;
        let start = Instant::now();

        let (sampled, sampled_width, sampled_height) = decimate(buffer, width, height, params.step);
        let sampled = if params.blur_sigma > 0.0 {
            let image = GrayImage::from_raw(sampled_width, sampled_height, sampled)
                .ok_or("decimated buffer does not match its dimensions")?;
            gaussian_blur_f32(&image, params.blur_sigma).into_raw()
        } else {
            sampled
        };

        let w = sampled_width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w, sampled_height as usize, |x, y| {
                sampled[y * w + x]
            });
        let grids = prepared.detect_grids();

        let scale = params.step as f64;
        let detections: Vec<Detection> = grids
            .iter()
            .map(|grid| {
                let corners = grid
                    .bounds
                    .map(|p| Point2::new(p.x as f64 * scale, p.y as f64 * scale));
                let mut detection = Detection::new(corners);
                detection.center = Some(centroid(&corners));
                match grid.decode() {
                    Ok((_, content)) => {
                        detection.id = content.trim().parse().ok();
                    }
                    Err(e) => trace!(error = %e, "QR grid located but not decoded"),
                }
                detection
            })
            .collect();

        trace!(
            count = detections.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "QR grid scan complete"
        );
        Ok(detections.into())
    }

    fn release(&mut self) {
        self.params = None;
    }
}

/// Keep every `step`-th pixel in both directions
fn decimate(buffer: &[u8], width: u32, height: u32, step: u32) -> (Vec<u8>, u32, u32) {
    if step <= 1 {
        return (buffer.to_vec(), width, height);
    }
    let out_width = width.div_ceil(step);
    let out_height = height.div_ceil(step);
    let mut out = Vec::with_capacity(out_width as usize * out_height as usize);
    for y in (0..height).step_by(step as usize) {
        let row = y as usize * width as usize;
        out.extend(
            (0..width)
                .step_by(step as usize)
                .map(|x| buffer[row + x as usize]),
        );
    }
    (out, out_width, out_height)
}

fn centroid(corners: &[Point2; 4]) -> Point2 {
    let x = corners.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let y = corners.iter().map(|p| p.y).sum::<f64>() / 4.0;
    Point2::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qr_config() -> DetectorConfig {
        DetectorConfig {
            family: QR_FAMILY.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_other_families() {
        let mut detector = QrGridDetector::new();
        assert!(detector.initialize(&DetectorConfig::default()).is_err());
        assert!(detector.initialize(&qr_config()).is_ok());
    }

    #[test]
    fn test_blank_frame_has_no_grids() {
        let mut detector = QrGridDetector::new();
        detector.initialize(&qr_config()).unwrap();
        let result = detector.detect(&[0; 64 * 48], 64, 48).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_detect_after_release_fails() {
        let mut detector = QrGridDetector::new();
        detector.initialize(&qr_config()).unwrap();
        detector.release();
        assert!(detector.detect(&[0; 4], 2, 2).is_err());
    }

    #[test]
    fn test_decimate_odd_dimensions() {
        let buffer: Vec<u8> = (0..15).collect();
        let (out, w, h) = decimate(&buffer, 5, 3, 2);
        assert_eq!((w, h), (3, 2));
        assert_eq!(out, vec![0, 2, 4, 10, 12, 14]);
    }

    #[test]
    fn test_blurred_scan_runs() {
        let mut detector = QrGridDetector::new();
        let config = DetectorConfig {
            blur_sigma: 0.8,
            decimation: 2.0,
            ..qr_config()
        };
        detector.initialize(&config).unwrap();
        let result = detector.detect(&[200; 40 * 30], 40, 30).unwrap();
        assert!(result.is_empty());
    }
}
