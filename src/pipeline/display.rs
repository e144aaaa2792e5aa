// SPDX-License-Identifier: GPL-3.0-only

//! Handoff of finished images to the display-owning context
//!
//! The worker never touches the display. For every finished frame it posts
//! exactly one image through a [`DisplayContext`] and moves on without
//! waiting for it to be shown.

use super::types::PresentableImage;
use futures::channel::mpsc;
use std::sync::Mutex;
use tracing::{debug, trace};

/// Posts finished images to the display-owning context
///
/// `post` is called from the pipeline worker and must not block.
pub trait DisplayContext: Send + Sync {
    fn post(&self, image: PresentableImage);
}

/// Receives images on the display-owning context
pub trait DisplaySink {
    fn present(&mut self, image: PresentableImage);
}

/// Bounded channel from the worker to the display context
///
/// When the display side falls behind, newly posted images are dropped; the
/// previously presented image simply stays on screen.
pub struct ChannelDisplay {
    sender: Mutex<mpsc::Sender<PresentableImage>>,
}

/// Display-context end of a [`ChannelDisplay`]
pub struct DisplayReceiver {
    receiver: mpsc::Receiver<PresentableImage>,
}

impl ChannelDisplay {
    /// Create a channel holding at most `depth` undelivered images
    pub fn new(depth: usize) -> (Self, DisplayReceiver) {
        // futures' mpsc adds one slot per sender on top of the buffer size
        let (sender, receiver) = mpsc::channel(depth.saturating_sub(1));
        (
            Self {
                sender: Mutex::new(sender),
            },
            DisplayReceiver { receiver },
        )
    }
}

impl DisplayContext for ChannelDisplay {
    fn post(&self, image: PresentableImage) {
        let sequence = image.sequence;
        let mut sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.try_send(image) {
            Ok(()) => trace!(sequence, "Posted image to display"),
            Err(e) if e.is_full() => {
                debug!(sequence, "Display behind, dropping image");
            }
            Err(_) => {
                debug!(sequence, "Display receiver gone, dropping image");
            }
        }
    }
}

impl DisplayReceiver {
    /// Take the next image if one is waiting
    pub fn try_next(&mut self) -> Option<PresentableImage> {
        self.receiver.try_next().ok().flatten()
    }

    /// Present every waiting image, returning how many were presented
    pub fn drain_into<S: DisplaySink>(&mut self, sink: &mut S) -> usize {
        let mut presented = 0;
        while let Some(image) = self.try_next() {
            sink.present(image);
            presented += 1;
        }
        presented
    }

    /// Async stream of images, for display loops driven by an executor
    pub fn into_stream(self) -> mpsc::Receiver<PresentableImage> {
        self.receiver
    }
}
