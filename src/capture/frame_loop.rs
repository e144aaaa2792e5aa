// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for frame loops
//!
//! Both the synthetic capture source and the pipeline worker run a loop body
//! on a dedicated named thread until asked to stop. This module owns that
//! thread: start, cooperative stop, join, and stop-on-drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop body to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a loop running on its own thread
///
/// The loop body is expected to return within a bounded time (for example by
/// waiting with a timeout) so the stop signal is observed promptly.
pub struct FrameLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl FrameLoopController {
    /// Start a new loop on a named thread
    ///
    /// `loop_fn` is called repeatedly until it returns [`LoopAction::Stop`] or
    /// [`stop`](Self::stop) is called.
    ///
    /// Returns an error only if the OS refuses to spawn the thread.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting frame loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Frame loop thread started");

                while !thread_stop.load(Ordering::SeqCst) {
                    if loop_fn() == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, "Frame loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting frame loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            // Joining from the loop's own thread would deadlock
            if handle.thread().id() == thread::current().id() {
                warn!(name = %self.name, "Frame loop asked to join itself, detaching");
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Frame loop thread finished");
            }
        }
    }
}

impl Drop for FrameLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "FrameLoopController dropped, stopping loop");
            self.stop();
        }
    }
}
