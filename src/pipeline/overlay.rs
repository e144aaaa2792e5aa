// SPDX-License-Identifier: GPL-3.0-only

//! Overlay rendering
//!
//! Replicates intensity into a color image and outlines each detection with
//! an axis-aligned rectangle spanning its corner 0 and corner 2.

use super::types::{Detection, DetectionResult, IntensityBuffer, PresentableImage};
use crate::config::OverlayStyle;
use crate::errors::RenderError;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::{debug, trace};

/// Grayscale to RGBA by channel replication (alpha = 255)
pub fn gray_to_color(buffer: &IntensityBuffer) -> Result<RgbaImage, RenderError> {
    let gray = buffer.to_gray_image().ok_or_else(|| {
        RenderError::InvalidImage(format!(
            "{} bytes cannot form a {}x{} image",
            buffer.data.len(),
            buffer.width,
            buffer.height
        ))
    })?;
    Ok(DynamicImage::ImageLuma8(gray).to_rgba8())
}

/// Render detections over the intensity image
///
/// With an empty result the output is exactly [`gray_to_color`] of the input.
pub fn render(
    buffer: &IntensityBuffer,
    detections: &DetectionResult,
    style: &OverlayStyle,
) -> Result<PresentableImage, RenderError> {
    let mut image = gray_to_color(buffer)?;
    let color = Rgba(style.color);

    debug!(
        sequence = buffer.sequence,
        count = detections.len(),
        "Rendering detection overlays"
    );
    for detection in detections {
        let (a, b) = detection.diagonal();
        trace!(
            id = ?detection.id,
            x0 = a.x,
            y0 = a.y,
            x2 = b.x,
            y2 = b.y,
            "Detection corners"
        );
        draw_detection(&mut image, detection, color, style.stroke_width);
    }

    Ok(PresentableImage {
        image,
        sequence: buffer.sequence,
        captured_at: buffer.captured_at,
        detection_count: detections.len(),
    })
}

/// Outline one detection, stroke growing inward from the corner 0 / corner 2 box
fn draw_detection(image: &mut RgbaImage, detection: &Detection, color: Rgba<u8>, stroke_width: u32) {
    let (a, b) = detection.diagonal();
    if ![a.x, a.y, b.x, b.y].iter().all(|v| v.is_finite()) {
        trace!(?detection, "Skipping detection with non-finite corners");
        return;
    }

    let left = a.x.min(b.x).round() as i64;
    let top = a.y.min(b.y).round() as i64;
    let right = a.x.max(b.x).round() as i64;
    let bottom = a.y.max(b.y).round() as i64;
    let (w, h) = (image.width() as i64, image.height() as i64);

    for inset in 0..stroke_width as i64 {
        let (l, t) = (left.saturating_add(inset), top.saturating_add(inset));
        let (r, b) = (right.saturating_sub(inset), bottom.saturating_sub(inset));
        // Inner rings are nested, so once a ring misses the image they all do
        if r < l || b < t || l >= w || t >= h || r < 0 || b < 0 {
            break;
        }
        // Pull offscreen edges in to just outside the image; the visible
        // pixels of the ring stay the same and the rect fits in i32
        let (l, t, r, b) = (l.max(-1), t.max(-1), r.min(w), b.min(h));
        let rect = Rect::at(l as i32, t as i32).of_size((r - l + 1) as u32, (b - t + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
