// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera
//!
//! Replays a still intensity image as a live 4:2:0 stream at a fixed
//! framerate. Useful for running the pipeline on machines without a camera
//! and for exercising backpressure with a real producer thread.

use super::frame_loop::{FrameLoopController, LoopAction};
use super::{CaptureResult, Frame, FrameCallback, FrameSource};
use crate::config::CaptureConfig;
use crate::constants::{capture as capture_defaults, timing};
use crate::errors::CaptureError;
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Frame source that streams a still image
pub struct VirtualCamera {
    pattern: GrayImage,
    frame_loop: Option<FrameLoopController>,
}

impl VirtualCamera {
    /// Create a virtual camera streaming `pattern`
    pub fn from_gray_image(pattern: GrayImage) -> Self {
        Self {
            pattern,
            frame_loop: None,
        }
    }

    /// Create a virtual camera streaming the contents of an image file
    ///
    /// The image is converted to intensity once at load time.
    pub fn from_image_file(path: &Path) -> CaptureResult<Self> {
        info!(path = %path.display(), "Loading virtual camera image");

        let img = image::open(path).map_err(|e| {
            CaptureError::DeviceUnavailable(format!(
                "Failed to load image '{}': {}",
                path.display(),
                e
            ))
        })?;

        let pattern = img.to_luma8();
        debug!(
            width = pattern.width(),
            height = pattern.height(),
            "Virtual camera image loaded"
        );
        Ok(Self::from_gray_image(pattern))
    }
}

impl FrameSource for VirtualCamera {
    fn open(&mut self, config: &CaptureConfig, on_frame: FrameCallback) -> CaptureResult<()> {
        if self.frame_loop.is_some() {
            return Err(CaptureError::AlreadyOpen);
        }

        let format = config
            .format()
            .filter(|f| f.is_planar_420())
            .ok_or_else(|| CaptureError::FormatNotSupported(config.pixel_format.clone()))?;
        if config.width == 0 || config.height == 0 {
            return Err(CaptureError::FormatNotSupported(format!(
                "{}x{}",
                config.width, config.height
            )));
        }

        // Scale the pattern to the requested resolution once, not per frame
        let luma = if self.pattern.dimensions() == (config.width, config.height) {
            self.pattern.as_raw().clone()
        } else {
            imageops::resize(&self.pattern, config.width, config.height, FilterType::Triangle)
                .into_raw()
        };

        let fps = config
            .framerate
            .unwrap_or(capture_defaults::DEFAULT_FRAMERATE)
            .max(1);
        let interval = Duration::from_secs(1) / fps;
        let (width, height) = (config.width, config.height);
        let mut sequence = 0u64;
        let mut next_frame_at = Instant::now();

        info!(width, height, fps, format = %format, "Opening virtual camera");

        let controller = FrameLoopController::start("virtual-camera", move || {
            let Some(frame) = Frame::from_luma(format, width, height, luma.clone(), sequence)
            else {
                warn!(sequence, "Failed to build virtual frame");
                return LoopAction::Stop;
            };
            on_frame(frame);

            if sequence % timing::FRAME_LOG_INTERVAL == 0 {
                debug!(sequence, "Virtual camera frame delivered");
            }
            sequence += 1;

            next_frame_at += interval;
            let now = Instant::now();
            if next_frame_at > now {
                thread::sleep(next_frame_at - now);
            } else {
                // Fell behind; don't try to catch up with a burst
                next_frame_at = now;
            }
            LoopAction::Continue
        })
        .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to spawn capture thread: {}", e)))?;

        self.frame_loop = Some(controller);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut controller) = self.frame_loop.take() {
            controller.stop();
            info!("Virtual camera closed");
        }
    }

    fn is_open(&self) -> bool {
        self.frame_loop.is_some()
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.close();
    }
}
