// SPDX-License-Identifier: MPL-2.0

//! AprilTag Camera - live fiducial-marker preview pipeline
//!
//! This library turns a stream of camera frames into annotated images ready
//! for display: luminance extraction, marker detection, overlay drawing and
//! orientation correction, with keep-latest backpressure between the camera
//! and a single processing worker.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`capture`]: Frame sources, frame types and capture loop threads
//! - [`pipeline`]: Processing stages, detector invoker and the coordinator
//! - [`config`]: Pipeline configuration handling
//! - [`constants`]: Defaults and timing constants
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```ignore
//! let (source, feed) = ManualSource::new();
//! let (display, mut receiver) = ChannelDisplay::new(1);
//! let mut pipeline = PipelineCoordinator::new(Config::default(), source, detector, display)?;
//! pipeline.resume()?;
//! // camera callback: feed.push(frame);
//! // display loop: receiver.drain_into(&mut sink);
//! pipeline.shutdown();
//! ```

pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipeline;

// Re-export commonly used types
pub use capture::{Frame, FrameFeed, FrameSource, ManualSource, PixelFormat, SensorRotation, VirtualCamera};
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{
    ChannelDisplay, DetectionResult, DisplayContext, PipelineCoordinator, PresentableImage, TagDetector,
};
