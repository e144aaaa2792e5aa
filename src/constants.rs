// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Detector defaults (the parameters the preview app initializes its detector with)
pub mod detector {
    /// Tag family
    pub const DEFAULT_FAMILY: &str = "tag36h11";

    /// Bit errors tolerated when decoding a tag
    pub const DEFAULT_HAMMING_TOLERANCE: u32 = 0;

    /// Input decimation factor (1.0 = full resolution)
    pub const DEFAULT_DECIMATION: f32 = 1.0;

    /// Gaussian blur sigma applied before quad detection (0.0 = off)
    pub const DEFAULT_BLUR_SIGMA: f32 = 0.0;

    /// Worker threads the detector may use internally
    pub const DEFAULT_THREAD_HINT: u32 = 1;
}

/// Capture defaults
pub mod capture {
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;
    pub const DEFAULT_PIXEL_FORMAT: &str = "NV21";
    pub const DEFAULT_FRAMERATE: u32 = 30;
}

/// Overlay defaults
pub mod overlay {
    /// Highlight color (RGBA, opaque green)
    pub const HIGHLIGHT_COLOR: [u8; 4] = [0, 255, 0, 255];

    /// Rectangle stroke width in pixels
    pub const STROKE_WIDTH: u32 = 2;
}

/// Display handoff defaults
pub mod display {
    /// Finished images allowed to wait for the display context
    pub const DEFAULT_QUEUE_DEPTH: usize = 1;
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Log performance stats every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// How long the worker waits for a frame before re-checking its stop signal
    pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);
}
