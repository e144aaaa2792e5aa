// SPDX-License-Identifier: GPL-3.0-only

//! Detector capability and its invoker
//!
//! The fiducial detector is an external, stateful native library. It is not
//! reentrant and holds state keyed to its initialization parameters, so every
//! call goes through [`DetectionInvoker`], which owns the detector behind a
//! single mutex and tracks its lifecycle:
//!
//! ```text
//! Uninitialized ──initialize──▶ Ready ──release──▶ Released
//!        ▲                                            │
//!        └───────────────(initialize again)───────────┘
//! ```

use super::types::{DetectionResult, IntensityBuffer};
use crate::config::DetectorConfig;
use crate::errors::DetectorError;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, trace};

/// The narrow contract a fiducial detector backend implements
///
/// Implementations wrap the native library; tests substitute mocks. The
/// invoker guarantees calls are serialized and that `detect` is only called
/// between a successful `initialize` and `release`.
pub trait TagDetector: Send {
    /// One-time setup with the tag family and tuning parameters
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), String>;

    /// Detect markers in a tightly packed `width * height` intensity buffer
    ///
    /// Zero detections is a valid result.
    fn detect(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<DetectionResult, String>;

    /// Free native resources
    fn release(&mut self) {}
}

/// Lifecycle state of the detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorStatus {
    /// `initialize` has not been called yet
    Uninitialized,
    /// Initialized with the given parameters
    Ready(DetectorConfig),
    /// Released during teardown
    Released,
}

struct InvokerState<D> {
    detector: D,
    status: DetectorStatus,
    calls: u64,
}

/// Owner of the detector and its serialization gate
pub struct DetectionInvoker<D: TagDetector> {
    state: Mutex<InvokerState<D>>,
}

impl<D: TagDetector> DetectionInvoker<D> {
    pub fn new(detector: D) -> Self {
        Self {
            state: Mutex::new(InvokerState {
                detector,
                status: DetectorStatus::Uninitialized,
                calls: 0,
            }),
        }
    }

    // A detector that panicked mid-call has unknown internal state; surface
    // that as a detection failure rather than calling into it again
    fn lock(&self) -> Result<MutexGuard<'_, InvokerState<D>>, DetectorError> {
        self.state
            .lock()
            .map_err(|_| DetectorError::Detection("detector panicked during a previous call".into()))
    }

    /// Initialize the detector
    ///
    /// # Returns
    /// * `Err(DetectorError::AlreadyInitialized)` - already `Ready`; release first
    /// * `Err(DetectorError::InitFailed)` - the backend rejected the parameters
    pub fn initialize(&self, config: &DetectorConfig) -> Result<(), DetectorError> {
        let mut state = self.lock()?;
        if matches!(state.status, DetectorStatus::Ready(_)) {
            return Err(DetectorError::AlreadyInitialized);
        }

        info!(
            family = %config.family,
            hamming = config.hamming_tolerance,
            decimation = config.decimation,
            blur_sigma = config.blur_sigma,
            threads = config.thread_hint,
            "Initializing tag detector"
        );

        match state.detector.initialize(config) {
            Ok(()) => {
                state.status = DetectorStatus::Ready(config.clone());
                state.calls = 0;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Tag detector initialization failed");
                Err(DetectorError::InitFailed(e))
            }
        }
    }

    /// Run the detector on one intensity buffer
    ///
    /// # Returns
    /// * `Err(DetectorError::NotInitialized)` - `initialize` never succeeded
    /// * `Err(DetectorError::Released)` - called after teardown
    /// * `Err(DetectorError::Detection)` - zero dimensions, size mismatch, or
    ///   a backend failure
    pub fn detect(&self, buffer: &[u8], width: u32, height: u32) -> Result<DetectionResult, DetectorError> {
        let mut state = self.lock()?;
        match state.status {
            DetectorStatus::Ready(_) => {}
            DetectorStatus::Uninitialized => return Err(DetectorError::NotInitialized),
            DetectorStatus::Released => return Err(DetectorError::Released),
        }

        if width == 0 || height == 0 {
            return Err(DetectorError::Detection(format!(
                "invalid dimensions {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize;
        if buffer.len() != expected {
            return Err(DetectorError::Detection(format!(
                "buffer is {} bytes, expected {} for {}x{}",
                buffer.len(),
                expected,
                width,
                height
            )));
        }

        let start = Instant::now();
        let result = state
            .detector
            .detect(buffer, width, height)
            .map_err(DetectorError::Detection)?;
        state.calls += 1;

        trace!(
            count = result.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Detector call complete"
        );
        Ok(result)
    }

    /// Convenience wrapper for [`detect`](Self::detect) on an intensity buffer
    pub fn detect_intensity(&self, buffer: &IntensityBuffer) -> Result<DetectionResult, DetectorError> {
        self.detect(&buffer.data, buffer.width, buffer.height)
    }

    /// Release the detector's native resources
    ///
    /// Waits for an in-progress `detect` to return. Idempotent; a released
    /// detector may be initialized again.
    pub fn release(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let DetectorStatus::Ready(_) = state.status {
            state.detector.release();
            info!(calls = state.calls, "Tag detector released");
        } else {
            debug!(status = ?state.status, "Tag detector release skipped");
        }
        if state.status != DetectorStatus::Uninitialized {
            state.status = DetectorStatus::Released;
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> DetectorStatus {
        match self.state.lock() {
            Ok(state) => state.status.clone(),
            Err(poisoned) => poisoned.into_inner().status.clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status(), DetectorStatus::Ready(_))
    }
}
