// SPDX-License-Identifier: GPL-3.0-only

//! Host-driven frame source
//!
//! Platform camera bindings own their capture session and receive frames on
//! their own callback thread. [`ManualSource`] is the pipeline-facing half of
//! that arrangement; the binding keeps the [`FrameFeed`] half and pushes each
//! frame it receives.

use super::{CaptureResult, Frame, FrameCallback, FrameSource};
use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace};

struct FeedShared {
    /// Held for reading across each delivery so `close` waits them out
    callback: RwLock<Option<FrameCallback>>,
    delivered: AtomicU64,
    ignored: AtomicU64,
}

impl FeedShared {
    fn set_callback(&self, callback: Option<FrameCallback>) {
        *self.callback.write().unwrap_or_else(|e| e.into_inner()) = callback;
    }
}

/// Frame source whose frames are pushed by the host through a [`FrameFeed`]
pub struct ManualSource {
    shared: Arc<FeedShared>,
    /// Reason the device cannot be opened, if any
    unavailable: Option<String>,
    open: bool,
}

/// Producer half of a [`ManualSource`]
#[derive(Clone)]
pub struct FrameFeed {
    shared: Arc<FeedShared>,
}

impl ManualSource {
    /// Create a source and the feed used to push frames into it
    pub fn new() -> (Self, FrameFeed) {
        let shared = Arc::new(FeedShared {
            callback: RwLock::new(None),
            delivered: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        });
        let source = Self {
            shared: Arc::clone(&shared),
            unavailable: None,
            open: false,
        };
        (source, FrameFeed { shared })
    }

    /// Create a source that fails to open, as when no camera exists or
    /// camera permission was denied
    pub fn unavailable(reason: &str) -> (Self, FrameFeed) {
        let (mut source, feed) = Self::new();
        source.unavailable = Some(reason.to_string());
        (source, feed)
    }
}

impl FrameSource for ManualSource {
    fn open(&mut self, config: &CaptureConfig, on_frame: FrameCallback) -> CaptureResult<()> {
        if let Some(reason) = &self.unavailable {
            return Err(CaptureError::DeviceUnavailable(reason.clone()));
        }
        if self.open {
            return Err(CaptureError::AlreadyOpen);
        }

        info!(
            width = config.width,
            height = config.height,
            format = %config.pixel_format,
            "Manual frame source opened"
        );
        self.shared.set_callback(Some(on_frame));
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.shared.set_callback(None);
        self.open = false;
        info!(
            delivered = self.shared.delivered.load(Ordering::Relaxed),
            ignored = self.shared.ignored.load(Ordering::Relaxed),
            "Manual frame source closed"
        );
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameFeed {
    /// Push a frame to the pipeline
    ///
    /// Returns false if the source is not open; the frame is dropped.
    pub fn push(&self, frame: Frame) -> bool {
        // Deliver under the read lock: once close() has taken the write lock
        // and cleared the callback, no delivery is running or can start
        let callback = self.shared.callback.read().unwrap_or_else(|e| e.into_inner());
        match callback.as_ref() {
            Some(callback) => {
                trace!(sequence = frame.sequence, "Delivering frame");
                callback(frame);
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                debug!(sequence = frame.sequence, "Frame source closed, ignoring frame");
                self.shared.ignored.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Number of frames delivered to the callback
    pub fn delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Number of frames pushed while the source was closed
    pub fn ignored(&self) -> u64 {
        self.shared.ignored.load(Ordering::Relaxed)
    }
}
