// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame processing pipeline
//!
//! Errors are split by the stage that raises them and converge on
//! [`PipelineError`]. Per-frame errors are dropped with the frame; lifecycle
//! and contract errors disable the subsystem that raised them.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level pipeline error
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Frame source errors
    Capture(CaptureError),
    /// Pixel format conversion errors
    Frame(FrameError),
    /// Detector lifecycle and invocation errors
    Detector(DetectorError),
    /// Overlay rendering and orientation errors
    Render(RenderError),
    /// Configuration errors
    Config(ConfigError),
    /// The pipeline (or one of its stages) was disabled by an earlier failure
    Disabled(String),
}

/// Frame source errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No camera exists or camera permission is absent
    DeviceUnavailable(String),
    /// The requested capture format cannot be produced
    FormatNotSupported(String),
    /// `open` was called on a source that is already streaming
    AlreadyOpen,
}

/// Frame conversion errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Pixel format is not a planar 4:2:0 layout, or its luminance plane is malformed
    UnsupportedFormat(String),
}

/// Detector errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// `detect` was called before `initialize`
    NotInitialized,
    /// `initialize` was called while the detector is already initialized
    AlreadyInitialized,
    /// The detector was released during teardown
    Released,
    /// The native detector rejected its configuration
    InitFailed(String),
    /// Malformed input or a failed detect call
    Detection(String),
}

/// Rendering errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Pixel data does not describe a valid image
    InvalidImage(String),
    /// Rotation is not a multiple of 90 degrees
    UnsupportedRotation(i32),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    Io(String),
    /// The config file is not valid JSON for [`crate::config::Config`]
    Parse(String),
    /// A value is out of range
    Invalid(String),
}

impl PipelineError {
    /// Whether this error only affects the frame that produced it
    ///
    /// Per-frame errors are logged and the frame is discarded; the worker
    /// keeps accepting frames. Everything else is a lifecycle or contract
    /// failure that disables the affected subsystem.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            PipelineError::Frame(_)
                | PipelineError::Detector(DetectorError::Detection(_))
                | PipelineError::Render(_)
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Capture(e) => write!(f, "Capture error: {}", e),
            PipelineError::Frame(e) => write!(f, "Frame error: {}", e),
            PipelineError::Detector(e) => write!(f, "Detector error: {}", e),
            PipelineError::Render(e) => write!(f, "Render error: {}", e),
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
            PipelineError::Disabled(msg) => write!(f, "Disabled: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CaptureError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            CaptureError::AlreadyOpen => write!(f, "Frame source is already open"),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::NotInitialized => write!(f, "Detector not initialized"),
            DetectorError::AlreadyInitialized => write!(f, "Detector already initialized"),
            DetectorError::Released => write!(f, "Detector has been released"),
            DetectorError::InitFailed(msg) => write!(f, "Initialization failed: {}", msg),
            DetectorError::Detection(msg) => write!(f, "Detection failed: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            RenderError::UnsupportedRotation(deg) => {
                write!(f, "Unsupported rotation: {}° (must be a multiple of 90)", deg)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for FrameError {}
impl std::error::Error for DetectorError {}
impl std::error::Error for RenderError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to PipelineError
impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::Capture(err)
    }
}

impl From<FrameError> for PipelineError {
    fn from(err: FrameError) -> Self {
        PipelineError::Frame(err)
    }
}

impl From<DetectorError> for PipelineError {
    fn from(err: DetectorError) -> Self {
        PipelineError::Detector(err)
    }
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        PipelineError::Render(err)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
