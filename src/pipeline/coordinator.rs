// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline coordinator
//!
//! Wires a frame source to a single worker thread through a capacity-1
//! keep-latest slot, and drives every accepted frame through
//! convert → detect → render → rotate → post.
//!
//! ```text
//! Idle ─▶ Capturing ─▶ Converting ─▶ Detecting ─▶ Rendering ─▶ Presenting ─▶ Idle
//!   ▲                      │              │            │
//!   └──────────────────────┴──(per-frame failure)──────┘
//! ```
//!
//! Teardown runs in a fixed order: stop accepting frames, wait for the
//! in-flight frame, release the detector, close the source.

use super::converter;
use super::detector::{DetectionInvoker, TagDetector};
use super::display::DisplayContext;
use super::orientation;
use super::overlay;
use super::stats::{PipelineStats, StatsSnapshot};
use super::types::{DetectionResult, PresentableImage};
use crate::capture::frame_loop::{FrameLoopController, LoopAction};
use crate::capture::latest::{LatestSlot, OfferOutcome, TakeOutcome};
use crate::capture::{Frame, FrameCallback, FrameSource, SensorRotation};
use crate::config::{Config, DetectorFailurePolicy, OverlayStyle};
use crate::constants::timing::{FRAME_LOG_INTERVAL, WORKER_POLL_INTERVAL};
use crate::errors::{ConfigError, PipelineError, PipelineResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Where the coordinator is in its per-frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not running; `resume` has not been called or teardown completed
    Stopped,
    /// Running, waiting for a frame
    Idle,
    /// A frame is pending in the slot
    Capturing,
    Converting,
    Detecting,
    Rendering,
    /// Handing the finished image to the display context
    Presenting,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Stopped => "stopped",
            PipelineState::Idle => "idle",
            PipelineState::Capturing => "capturing",
            PipelineState::Converting => "converting",
            PipelineState::Detecting => "detecting",
            PipelineState::Rendering => "rendering",
            PipelineState::Presenting => "presenting",
        };
        write!(f, "{}", name)
    }
}

/// State of the detection stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionStatus {
    /// Detector not initialized yet
    Pending,
    /// Frames are run through the detector
    Active,
    /// Detection is off for good; frames are presented without overlays
    Disabled(String),
}

impl DetectionStatus {
    pub fn is_disabled(&self) -> bool {
        matches!(self, DetectionStatus::Disabled(_))
    }
}

/// State shared by the delivery callback, the worker and the coordinator
struct Shared {
    state: Mutex<PipelineState>,
    detection: Mutex<DetectionStatus>,
    stats: PipelineStats,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipelineState::Stopped),
            detection: Mutex::new(DetectionStatus::Pending),
            stats: PipelineStats::default(),
        }
    }

    fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = *state;
        if current != next {
            trace!(from = %current, to = %next, "Pipeline state");
            *state = next;
        }
    }

    /// Settle the state after a frame, deciding from the slot while the state
    /// lock is held so a concurrent [`mark_capturing`](Self::mark_capturing)
    /// lands either before the check or after the write
    fn finish_frame(&self, slot: &LatestSlot<Frame>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let next = if slot.is_closed() {
            PipelineState::Stopped
        } else if slot.has_pending() {
            PipelineState::Capturing
        } else {
            PipelineState::Idle
        };
        if *state != next {
            trace!(from = %*state, to = %next, "Pipeline state");
            *state = next;
        }
    }

    /// Move Idle to Capturing; a busy worker keeps its own state
    fn mark_capturing(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == PipelineState::Idle {
            *state = PipelineState::Capturing;
        }
    }

    fn detection(&self) -> DetectionStatus {
        self.detection.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_detection(&self, status: DetectionStatus) {
        *self.detection.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn disable_detection(&self, reason: String) {
        let mut detection = self.detection.lock().unwrap_or_else(|e| e.into_inner());
        if !detection.is_disabled() {
            error!(reason = %reason, "Detection disabled");
            *detection = DetectionStatus::Disabled(reason);
        }
    }

    /// Frame delivery from the source's context
    fn on_frame(&self, slot: &LatestSlot<Frame>, frame: Frame) {
        let sequence = frame.sequence;
        self.stats.record_offered();
        match slot.offer(frame) {
            OfferOutcome::Accepted => {
                self.stats.record_accepted(false);
                self.mark_capturing();
                trace!(sequence, "Frame accepted");
            }
            OfferOutcome::Replaced => {
                self.stats.record_accepted(true);
                debug!(sequence, "Frame replaced pending frame");
            }
            OfferOutcome::Closed => {
                self.stats.record_ignored();
                debug!(sequence, "Pipeline not accepting frames, ignoring");
            }
        }
    }
}

/// Everything the worker thread needs to process frames
struct Worker<D: TagDetector, P: DisplayContext> {
    slot: Arc<LatestSlot<Frame>>,
    invoker: Arc<DetectionInvoker<D>>,
    display: Arc<P>,
    shared: Arc<Shared>,
    style: OverlayStyle,
    rotation: SensorRotation,
    policy: DetectorFailurePolicy,
    busy_time: Duration,
}

impl<D: TagDetector, P: DisplayContext> Worker<D, P> {
    fn poll(&mut self) -> LoopAction {
        match self.slot.take_timeout(WORKER_POLL_INTERVAL) {
            TakeOutcome::Item(frame) => {
                self.process(frame);
                LoopAction::Continue
            }
            TakeOutcome::Empty => LoopAction::Continue,
            TakeOutcome::Closed => LoopAction::Stop,
        }
    }

    fn process(&mut self, frame: Frame) {
        let sequence = frame.sequence;
        let start = Instant::now();

        match self.run_stages(frame) {
            Ok(image) => {
                self.shared.set_state(PipelineState::Presenting);
                self.display.post(image);
                self.shared.stats.record_presented();
            }
            Err(e) if e.is_per_frame() => {
                warn!(sequence, error = %e, "Frame processing failed, dropping frame");
                self.shared.stats.record_failed();
            }
            Err(e) => {
                error!(sequence, error = %e, "Detector contract violated");
                self.shared.stats.record_failed();
                self.shared.disable_detection(e.to_string());
                if self.policy == DetectorFailurePolicy::StopPipeline {
                    // Closing the slot ends this loop after the current frame
                    self.slot.close();
                }
            }
        }

        self.busy_time += start.elapsed();
        let processed = self.shared.stats.record_processed();
        self.shared.finish_frame(&self.slot);

        if processed % FRAME_LOG_INTERVAL == 0 {
            let stats = self.shared.stats.snapshot();
            let avg_ms = self.busy_time.as_secs_f64() * 1000.0 / FRAME_LOG_INTERVAL as f64;
            info!(
                processed,
                presented = stats.presented,
                dropped = stats.dropped(),
                failed = stats.failed,
                avg_ms = %format!("{:.2}", avg_ms),
                "Pipeline performance"
            );
            self.busy_time = Duration::ZERO;
        }
    }

    fn run_stages(&self, frame: Frame) -> PipelineResult<PresentableImage> {
        self.shared.set_state(PipelineState::Converting);
        let intensity = converter::convert(&frame)?;
        drop(frame);

        let detections = if self.shared.detection() == DetectionStatus::Active {
            self.shared.set_state(PipelineState::Detecting);
            self.invoker.detect_intensity(&intensity)?
        } else {
            DetectionResult::empty()
        };

        self.shared.set_state(PipelineState::Rendering);
        let image = overlay::render(&intensity, &detections, &self.style)?;
        Ok(orientation::rotate(image, self.rotation))
    }
}

/// Owns the frame source, the detector and the worker thread
///
/// Host lifecycle events map onto [`resume`](Self::resume) (start/resume)
/// and [`pause`](Self::pause) / [`shutdown`](Self::shutdown) (pause, stop,
/// destroy). Dropping the coordinator tears it down.
pub struct PipelineCoordinator<S, D, P>
where
    S: FrameSource,
    D: TagDetector + 'static,
    P: DisplayContext + 'static,
{
    config: Config,
    rotation: SensorRotation,
    source: S,
    invoker: Arc<DetectionInvoker<D>>,
    display: Arc<P>,
    slot: Arc<LatestSlot<Frame>>,
    shared: Arc<Shared>,
    worker: Option<FrameLoopController>,
    shut_down: bool,
}

impl<S, D, P> PipelineCoordinator<S, D, P>
where
    S: FrameSource,
    D: TagDetector + 'static,
    P: DisplayContext + 'static,
{
    /// Create a stopped pipeline
    ///
    /// # Returns
    /// * `Err(PipelineError::Config)` - the configuration is out of range
    pub fn new(config: Config, source: S, detector: D, display: P) -> PipelineResult<Self> {
        config.validate()?;
        let rotation = config.sensor_rotation().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unsupported sensor rotation {}",
                config.sensor_rotation_degrees
            ))
        })?;

        let slot = LatestSlot::new();
        slot.close();

        Ok(Self {
            config,
            rotation,
            source,
            invoker: Arc::new(DetectionInvoker::new(detector)),
            display: Arc::new(display),
            slot: Arc::new(slot),
            shared: Arc::new(Shared::new()),
            worker: None,
            shut_down: false,
        })
    }

    /// Start or resume processing
    ///
    /// Initializes the detector if it is not ready, starts the worker and
    /// opens the frame source. A running pipeline is left as is.
    ///
    /// # Returns
    /// * `Ok(status)` - running; `status` says whether overlays are drawn
    /// * `Err(PipelineError::Capture)` - the source could not be opened
    /// * `Err(PipelineError::Detector)` - initialization failed under
    ///   [`DetectorFailurePolicy::StopPipeline`]
    /// * `Err(PipelineError::Disabled)` - called after [`shutdown`](Self::shutdown),
    ///   or detection was disabled under [`DetectorFailurePolicy::StopPipeline`]
    pub fn resume(&mut self) -> PipelineResult<DetectionStatus> {
        if self.shut_down {
            return Err(PipelineError::Disabled("pipeline has been shut down".into()));
        }
        if self.worker.as_ref().is_some_and(|w| w.is_running()) {
            debug!("Pipeline already running");
            return Ok(self.shared.detection());
        }
        // A worker that stopped itself still needs joining
        if self.worker.is_some() {
            self.teardown();
        }

        self.initialize_detector()?;

        self.slot.reopen();
        self.shared.set_state(PipelineState::Idle);

        let mut worker = Worker {
            slot: Arc::clone(&self.slot),
            invoker: Arc::clone(&self.invoker),
            display: Arc::clone(&self.display),
            shared: Arc::clone(&self.shared),
            style: self.config.overlay.clone(),
            rotation: self.rotation,
            policy: self.config.on_detector_failure,
            busy_time: Duration::ZERO,
        };
        let controller = match FrameLoopController::start("pipeline-worker", move || worker.poll()) {
            Ok(controller) => controller,
            Err(e) => {
                self.teardown();
                return Err(PipelineError::Disabled(format!("failed to spawn worker: {}", e)));
            }
        };
        self.worker = Some(controller);

        let slot = Arc::clone(&self.slot);
        let shared = Arc::clone(&self.shared);
        let on_frame: FrameCallback = Arc::new(move |frame: Frame| shared.on_frame(&slot, frame));

        if let Err(e) = self.source.open(&self.config.capture, on_frame) {
            error!(error = %e, "Failed to open frame source");
            self.teardown();
            return Err(e.into());
        }

        let status = self.shared.detection();
        info!(
            width = self.config.capture.width,
            height = self.config.capture.height,
            format = %self.config.capture.pixel_format,
            rotation = %self.rotation,
            detection = ?status,
            "Pipeline running"
        );
        Ok(status)
    }

    fn initialize_detector(&mut self) -> PipelineResult<()> {
        if let DetectionStatus::Disabled(reason) = self.shared.detection() {
            return match self.config.on_detector_failure {
                DetectorFailurePolicy::ContinueWithoutOverlay => Ok(()),
                DetectorFailurePolicy::StopPipeline => Err(PipelineError::Disabled(reason)),
            };
        }
        if self.invoker.is_ready() {
            return Ok(());
        }

        match self.invoker.initialize(&self.config.detector) {
            Ok(()) => {
                self.shared.set_detection(DetectionStatus::Active);
                Ok(())
            }
            Err(e) => match self.config.on_detector_failure {
                DetectorFailurePolicy::ContinueWithoutOverlay => {
                    warn!(error = %e, "Continuing without detection overlays");
                    self.shared.disable_detection(e.to_string());
                    Ok(())
                }
                DetectorFailurePolicy::StopPipeline => {
                    self.shared.set_detection(DetectionStatus::Pending);
                    Err(e.into())
                }
            },
        }
    }

    /// Tear down for a pause; [`resume`](Self::resume) starts again
    pub fn pause(&mut self) {
        self.teardown();
    }

    /// Tear down for good
    pub fn shutdown(&mut self) {
        self.teardown();
        self.shut_down = true;
    }

    /// Stop delivery, drain the worker, release the detector, close the source
    ///
    /// Safe to call any number of times.
    fn teardown(&mut self) {
        let was_accepting = self.slot.close();

        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }

        self.invoker.release();
        if self.shared.detection() == DetectionStatus::Active {
            self.shared.set_detection(DetectionStatus::Pending);
        }

        if self.source.is_open() {
            self.source.close();
        }

        self.shared.set_state(PipelineState::Stopped);
        if was_accepting {
            let stats = self.shared.stats.snapshot();
            info!(
                processed = stats.processed,
                presented = stats.presented,
                dropped = stats.dropped(),
                failed = stats.failed,
                "Pipeline torn down"
            );
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn detection_status(&self) -> DetectionStatus {
        self.shared.detection()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Check if the worker is running
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_running())
    }

    pub fn invoker(&self) -> &DetectionInvoker<D> {
        &self.invoker
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<S, D, P> Drop for PipelineCoordinator<S, D, P>
where
    S: FrameSource,
    D: TagDetector + 'static,
    P: DisplayContext + 'static,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
