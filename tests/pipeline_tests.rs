// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the pipeline coordinator

use apriltag_camera::capture::{
    CaptureResult, Frame, FrameCallback, FrameSource, ManualSource, PixelFormat, Plane, VirtualCamera,
};
use apriltag_camera::config::{CaptureConfig, Config, DetectorConfig, DetectorFailurePolicy};
use apriltag_camera::errors::{CaptureError, DetectorError, PipelineError};
use apriltag_camera::pipeline::overlay::gray_to_color;
use apriltag_camera::pipeline::{
    ChannelDisplay, Detection, DetectionResult, DetectionStatus, DetectorStatus, DisplayContext,
    DisplaySink, IntensityBuffer, PipelineCoordinator, PipelineState, PresentableImage, TagDetector,
};
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(150);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn config(width: u32, height: u32) -> Config {
    let mut config = Config::default();
    config.capture.width = width;
    config.capture.height = height;
    config
}

/// Frame whose every luma byte carries its sequence number
fn frame(sequence: u64) -> Frame {
    Frame::from_luma(PixelFormat::NV21, 16, 16, vec![sequence as u8; 256], sequence).unwrap()
}

/// Display context that forwards to a std channel
struct TestDisplay {
    tx: Mutex<Sender<PresentableImage>>,
}

impl DisplayContext for TestDisplay {
    fn post(&self, image: PresentableImage) {
        let _ = self.tx.lock().unwrap().send(image);
    }
}

fn test_display() -> (TestDisplay, Receiver<PresentableImage>) {
    let (tx, rx) = mpsc::channel();
    (TestDisplay { tx: Mutex::new(tx) }, rx)
}

/// Returns queued results in order, then empty results
#[derive(Default)]
struct ScriptedDetector {
    script: VecDeque<Result<DetectionResult, String>>,
    calls: Arc<AtomicUsize>,
}

impl TagDetector for ScriptedDetector {
    fn initialize(&mut self, _config: &DetectorConfig) -> Result<(), String> {
        Ok(())
    }

    fn detect(&mut self, _buffer: &[u8], _w: u32, _h: u32) -> Result<DetectionResult, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or_else(|| Ok(DetectionResult::empty()))
    }
}

/// Announces each call with the buffer's first byte, then blocks until released
struct GatedDetector {
    entered: Sender<u8>,
    gate: Receiver<()>,
}

impl TagDetector for GatedDetector {
    fn initialize(&mut self, _config: &DetectorConfig) -> Result<(), String> {
        Ok(())
    }

    fn detect(&mut self, buffer: &[u8], _w: u32, _h: u32) -> Result<DetectionResult, String> {
        let _ = self.entered.send(buffer[0]);
        let _ = self.gate.recv_timeout(TIMEOUT);
        Ok(DetectionResult::empty())
    }
}

/// Rejects initialization; must never be asked to detect
struct BrokenDetector {
    detect_calls: Arc<AtomicUsize>,
}

impl TagDetector for BrokenDetector {
    fn initialize(&mut self, _config: &DetectorConfig) -> Result<(), String> {
        Err("native library missing".into())
    }

    fn detect(&mut self, _buffer: &[u8], _w: u32, _h: u32) -> Result<DetectionResult, String> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DetectionResult::empty())
    }
}

/// Source that keeps its callback after close, like a camera still draining
/// its last buffers
#[derive(Default)]
struct LingeringSource {
    callback: Arc<Mutex<Option<FrameCallback>>>,
    open: bool,
}

impl FrameSource for LingeringSource {
    fn open(&mut self, _config: &CaptureConfig, on_frame: FrameCallback) -> CaptureResult<()> {
        *self.callback.lock().unwrap() = Some(on_frame);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[test]
fn test_slow_worker_keeps_only_latest_frame() {
    init_tracing();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let detector = GatedDetector {
        entered: entered_tx,
        gate: gate_rx,
    };
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut pipeline = PipelineCoordinator::new(config(16, 16), source, detector, display).unwrap();
    pipeline.resume().unwrap();

    assert!(feed.push(frame(1)));
    assert_eq!(entered_rx.recv_timeout(TIMEOUT).unwrap(), 1);
    assert_eq!(pipeline.state(), PipelineState::Detecting);

    for sequence in 2..=10 {
        assert!(feed.push(frame(sequence)));
    }

    gate_tx.send(()).unwrap();
    assert_eq!(entered_rx.recv_timeout(TIMEOUT).unwrap(), 10);
    gate_tx.send(()).unwrap();

    let first = images.recv_timeout(TIMEOUT).unwrap();
    let second = images.recv_timeout(TIMEOUT).unwrap();
    assert_eq!([first.sequence, second.sequence], [1, 10]);
    assert!(images.recv_timeout(QUIET).is_err());

    pipeline.shutdown();
    let stats = pipeline.stats();
    assert_eq!(stats.offered, 10);
    assert_eq!(stats.replaced, 8);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.presented, 2);
    assert_eq!(stats.dropped(), 8);
}

#[test]
fn test_detections_drawn_and_counted() {
    init_tracing();
    let detector = ScriptedDetector {
        script: VecDeque::from([Ok(DetectionResult::from(vec![Detection::from_flat_corners([
            2.0, 2.0, 12.0, 2.0, 12.0, 12.0, 2.0, 12.0,
        ])
        .with_id(5)]))]),
        ..Default::default()
    };
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut pipeline = PipelineCoordinator::new(config(16, 16), source, detector, display).unwrap();
    assert_eq!(pipeline.resume().unwrap(), DetectionStatus::Active);

    feed.push(frame(40));
    let image = images.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(image.detection_count, 1);
    assert_eq!(image.image.get_pixel(2, 2).0, [0, 255, 0, 255]);
    assert_eq!(image.image.get_pixel(12, 12).0, [0, 255, 0, 255]);
    assert_eq!(image.image.get_pixel(7, 7).0, [40, 40, 40, 255]);
}

#[test]
fn test_per_frame_failures_do_not_stop_worker() {
    init_tracing();
    let detector = ScriptedDetector {
        script: VecDeque::from([Err("quad decode blew up".to_string())]),
        ..Default::default()
    };
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut pipeline = PipelineCoordinator::new(config(16, 16), source, detector, display).unwrap();
    pipeline.resume().unwrap();

    // Luminance plane far smaller than 16x16
    let truncated = Frame::new(16, 16, PixelFormat::NV21, vec![Plane::new(vec![0u8; 10], 16)], 1);
    feed.push(truncated);
    assert!(images.recv_timeout(QUIET).is_err());

    // Packed format the converter does not accept
    let packed = Frame::new(16, 16, PixelFormat::YUYV, vec![Plane::new(vec![0u8; 512], 32)], 2);
    feed.push(packed);
    assert!(images.recv_timeout(QUIET).is_err());

    // Detector error on this one
    feed.push(frame(3));
    assert!(images.recv_timeout(QUIET).is_err());

    feed.push(frame(4));
    assert_eq!(images.recv_timeout(TIMEOUT).unwrap().sequence, 4);

    pipeline.shutdown();
    let stats = pipeline.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.presented, 1);
    assert_eq!(pipeline.detection_status(), DetectionStatus::Pending);
}

#[test]
fn test_teardown_is_idempotent_and_resumable() {
    init_tracing();
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut pipeline =
        PipelineCoordinator::new(config(16, 16), source, ScriptedDetector::default(), display).unwrap();

    pipeline.resume().unwrap();
    feed.push(frame(1));
    assert_eq!(images.recv_timeout(TIMEOUT).unwrap().sequence, 1);

    pipeline.pause();
    pipeline.pause();
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(!pipeline.is_running());
    assert!(!pipeline.source().is_open());
    assert_eq!(pipeline.invoker().status(), DetectorStatus::Released);
    assert_eq!(
        pipeline.invoker().detect(&[0; 4], 2, 2),
        Err(DetectorError::Released)
    );
    assert!(!feed.push(frame(2)));

    // Resume re-opens the source and re-initializes the detector
    assert_eq!(pipeline.resume().unwrap(), DetectionStatus::Active);
    assert!(pipeline.invoker().is_ready());
    feed.push(frame(3));
    assert_eq!(images.recv_timeout(TIMEOUT).unwrap().sequence, 3);
}

#[test]
fn test_frames_after_teardown_are_ignored() {
    init_tracing();
    let source = LingeringSource::default();
    let callback = Arc::clone(&source.callback);
    let (display, images) = test_display();
    let mut pipeline =
        PipelineCoordinator::new(config(16, 16), source, ScriptedDetector::default(), display).unwrap();
    pipeline.resume().unwrap();
    pipeline.shutdown();

    let late = callback.lock().unwrap().clone().unwrap();
    late(frame(9));
    late(frame(10));

    assert!(images.recv_timeout(QUIET).is_err());
    let stats = pipeline.stats();
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.processed, 0);
}

#[test]
fn test_unavailable_device_is_reported() {
    init_tracing();
    let (source, feed) = ManualSource::unavailable("camera permission denied");
    let (display, _images) = test_display();
    let mut pipeline =
        PipelineCoordinator::new(config(16, 16), source, ScriptedDetector::default(), display).unwrap();

    match pipeline.resume() {
        Err(PipelineError::Capture(CaptureError::DeviceUnavailable(reason))) => {
            assert!(reason.contains("permission"));
        }
        other => panic!("Expected DeviceUnavailable, got {:?}", other),
    }
    assert!(!pipeline.is_running());
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(!pipeline.invoker().is_ready());
    assert!(!feed.push(frame(1)));
}

#[test]
fn test_detector_failure_continues_without_overlay() {
    init_tracing();
    let detect_calls = Arc::new(AtomicUsize::new(0));
    let detector = BrokenDetector {
        detect_calls: Arc::clone(&detect_calls),
    };
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut pipeline = PipelineCoordinator::new(config(16, 16), source, detector, display).unwrap();

    let status = pipeline.resume().unwrap();
    assert!(status.is_disabled());

    feed.push(frame(7));
    let image = images.recv_timeout(TIMEOUT).unwrap();
    let plain = gray_to_color(&IntensityBuffer::new(16, 16, vec![7; 256], 7).unwrap()).unwrap();
    assert_eq!(image.image, plain);
    assert_eq!(image.detection_count, 0);
    assert_eq!(detect_calls.load(Ordering::SeqCst), 0);

    // Disabled is terminal; a later resume does not retry initialization
    pipeline.pause();
    assert!(pipeline.resume().unwrap().is_disabled());
}

#[test]
fn test_detector_failure_can_stop_pipeline() {
    init_tracing();
    let detector = BrokenDetector {
        detect_calls: Arc::new(AtomicUsize::new(0)),
    };
    let (source, feed) = ManualSource::new();
    let (display, _images) = test_display();
    let mut config = config(16, 16);
    config.on_detector_failure = DetectorFailurePolicy::StopPipeline;
    let mut pipeline = PipelineCoordinator::new(config, source, detector, display).unwrap();

    assert!(matches!(
        pipeline.resume(),
        Err(PipelineError::Detector(DetectorError::InitFailed(_)))
    ));
    assert!(!pipeline.is_running());
    assert!(!feed.push(frame(1)));
}

#[test]
fn test_sensor_rotation_applied() {
    init_tracing();
    let (source, feed) = ManualSource::new();
    let (display, images) = test_display();
    let mut config = config(16, 8);
    config.sensor_rotation_degrees = 90;
    let mut pipeline = PipelineCoordinator::new(config, source, ScriptedDetector::default(), display).unwrap();
    pipeline.resume().unwrap();

    let wide = Frame::from_luma(PixelFormat::I420, 16, 8, vec![60; 128], 1).unwrap();
    feed.push(wide);
    let image = images.recv_timeout(TIMEOUT).unwrap();
    assert_eq!((image.width(), image.height()), (8, 16));
}

#[derive(Default)]
struct CountingSink {
    sequences: Vec<u64>,
}

impl DisplaySink for CountingSink {
    fn present(&mut self, image: PresentableImage) {
        self.sequences.push(image.sequence);
    }
}

#[test]
fn test_virtual_camera_through_channel_display() {
    init_tracing();
    let pattern = GrayImage::from_fn(40, 30, |x, _| Luma([(x * 6) as u8]));
    let source = VirtualCamera::from_gray_image(pattern);
    let (display, mut receiver) = ChannelDisplay::new(1);
    let mut config = config(32, 24);
    config.capture.framerate = Some(200);
    let mut pipeline = PipelineCoordinator::new(config, source, ScriptedDetector::default(), display).unwrap();
    pipeline.resume().unwrap();

    let mut sink = CountingSink::default();
    let start = Instant::now();
    while sink.sequences.len() < 3 && start.elapsed() < TIMEOUT {
        receiver.drain_into(&mut sink);
        std::thread::sleep(Duration::from_millis(5));
    }
    pipeline.shutdown();

    assert!(sink.sequences.len() >= 3);
    assert!(sink.sequences.windows(2).all(|w| w[0] < w[1]));
    assert!(!pipeline.source().is_open());
    assert!(pipeline.stats().offered >= 3);
}
