// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipeline
//!
//! Every accepted frame runs through the same stages on one worker thread:
//!
//! ```text
//! Frame ─▶ converter ─▶ detector ─▶ overlay ─▶ orientation ─▶ display
//!          (luma)       (quads)     (RGBA)     (rotate)       (post)
//! ```
//!
//! The stages are plain functions or, for the detector, a serialized
//! invoker; [`coordinator::PipelineCoordinator`] sequences them and owns the
//! lifecycle.

pub mod converter;
pub mod coordinator;
pub mod detector;
pub mod display;
pub mod orientation;
pub mod overlay;
pub mod qr_detector;
pub mod stats;
pub mod types;

pub use coordinator::{DetectionStatus, PipelineCoordinator, PipelineState};
pub use detector::{DetectionInvoker, DetectorStatus, TagDetector};
pub use display::{ChannelDisplay, DisplayContext, DisplayReceiver, DisplaySink};
pub use qr_detector::QrGridDetector;
pub use stats::StatsSnapshot;
pub use types::*;
