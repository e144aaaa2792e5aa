// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Stored as JSON. Missing fields fall back to their defaults, so a config
//! file only needs to name the values it changes.

use crate::capture::{PixelFormat, SensorRotation};
use crate::constants::{capture, detector, display, overlay};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Capture format requested from the frame source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Pixel format (e.g., "NV21", "NV12", "I420")
    pub pixel_format: String,
    /// Framerate, None lets the source decide
    pub framerate: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: capture::DEFAULT_WIDTH,
            height: capture::DEFAULT_HEIGHT,
            pixel_format: capture::DEFAULT_PIXEL_FORMAT.to_string(),
            framerate: Some(capture::DEFAULT_FRAMERATE),
        }
    }
}

impl CaptureConfig {
    /// Parsed pixel format, None if the name is not recognized
    pub fn format(&self) -> Option<PixelFormat> {
        PixelFormat::from_name(&self.pixel_format)
    }
}

/// Parameters passed to the detector's one-time initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Tag family name (e.g., "tag36h11")
    pub family: String,
    /// Maximum number of bit errors corrected when decoding
    pub hamming_tolerance: u32,
    /// Input decimation factor
    pub decimation: f32,
    /// Gaussian blur sigma
    pub blur_sigma: f32,
    /// Threads the detector may use internally
    pub thread_hint: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            family: detector::DEFAULT_FAMILY.to_string(),
            hamming_tolerance: detector::DEFAULT_HAMMING_TOLERANCE,
            decimation: detector::DEFAULT_DECIMATION,
            blur_sigma: detector::DEFAULT_BLUR_SIGMA,
            thread_hint: detector::DEFAULT_THREAD_HINT,
        }
    }
}

/// How detections are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Highlight color (RGBA)
    pub color: [u8; 4],
    /// Stroke width in pixels
    pub stroke_width: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: overlay::HIGHLIGHT_COLOR,
            stroke_width: overlay::STROKE_WIDTH,
        }
    }
}

/// What the pipeline does when the detector cannot be initialized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorFailurePolicy {
    /// Keep presenting frames, without overlays
    #[default]
    ContinueWithoutOverlay,
    /// Stop the whole pipeline
    StopPipeline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture format
    pub capture: CaptureConfig,
    /// Detector initialization parameters
    pub detector: DetectorConfig,
    /// Overlay style
    pub overlay: OverlayStyle,
    /// Clockwise rotation from sensor to display orientation
    pub sensor_rotation_degrees: i32,
    /// Finished images allowed to wait for the display context
    pub display_queue_depth: usize,
    /// Policy when detector initialization fails
    pub on_detector_failure: DetectorFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            detector: DetectorConfig::default(),
            overlay: OverlayStyle::default(),
            sensor_rotation_degrees: 0,
            display_queue_depth: display::DEFAULT_QUEUE_DEPTH,
            on_detector_failure: DetectorFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        debug!(?config, "Parsed pipeline configuration");
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sensor rotation as an enum (valid after `validate`)
    pub fn sensor_rotation(&self) -> Option<SensorRotation> {
        SensorRotation::from_degrees_int(self.sensor_rotation_degrees)
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid(format!(
                "capture resolution must be non-zero, got {}x{}",
                self.capture.width, self.capture.height
            ));
        }
        match self.capture.format() {
            Some(format) if format.is_planar_420() => {}
            _ => {
                return invalid(format!(
                    "capture pixel format must be a planar 4:2:0 format, got '{}'",
                    self.capture.pixel_format
                ));
            }
        }
        if self.capture.framerate == Some(0) {
            return invalid("capture framerate must be non-zero".to_string());
        }
        if self.detector.family.trim().is_empty() {
            return invalid("detector family must not be empty".to_string());
        }
        if !(self.detector.decimation > 0.0) {
            return invalid(format!(
                "detector decimation must be positive, got {}",
                self.detector.decimation
            ));
        }
        if !(self.detector.blur_sigma >= 0.0) {
            return invalid(format!(
                "detector blur sigma must not be negative, got {}",
                self.detector.blur_sigma
            ));
        }
        if self.detector.thread_hint == 0 {
            return invalid("detector thread hint must be at least 1".to_string());
        }
        if self.overlay.stroke_width == 0 {
            return invalid("overlay stroke width must be at least 1".to_string());
        }
        if self.display_queue_depth == 0 {
            return invalid("display queue depth must be at least 1".to_string());
        }
        if self.sensor_rotation().is_none() {
            return invalid(format!(
                "sensor rotation must be a multiple of 90, got {}",
                self.sensor_rotation_degrees
            ));
        }
        Ok(())
    }
}
