// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources
//!
//! A frame source pushes camera frames to a registered callback from its own
//! delivery context. The pipeline never pulls frames; it decouples delivery
//! from processing with a [`latest::LatestSlot`].
//!
//! ```text
//! ┌──────────────────┐  callback   ┌────────────┐  take   ┌────────┐
//! │ FrameSource      │ ──────────▶ │ LatestSlot │ ──────▶ │ worker │
//! │ (camera context) │             │ (cap. 1)   │         │        │
//! └──────────────────┘             └────────────┘         └────────┘
//! ```

pub mod frame_loop;
pub mod latest;
pub mod manual;
pub mod types;
pub mod virtual_camera;

pub use manual::{FrameFeed, ManualSource};
pub use types::*;
pub use virtual_camera::VirtualCamera;

use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use std::sync::Arc;

/// Result type for frame source operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Callback invoked by a frame source for every delivered frame
///
/// Called on the source's delivery context; must not block.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Camera stream abstraction
///
/// Lifecycle: `open` registers the callback and starts delivery; `close`
/// stops delivery and releases the device synchronously. `close` is
/// idempotent and frames produced after it returns are never delivered.
pub trait FrameSource: Send {
    /// Open the device and start pushing frames to `on_frame`
    ///
    /// # Returns
    /// * `Err(CaptureError::DeviceUnavailable)` - no camera, or permission absent
    /// * `Err(CaptureError::AlreadyOpen)` - source is already streaming
    fn open(&mut self, config: &CaptureConfig, on_frame: FrameCallback) -> CaptureResult<()>;

    /// Stop delivery and release the device
    fn close(&mut self);

    /// Check if the source is currently streaming
    fn is_open(&self) -> bool;
}
