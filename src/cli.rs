// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the preview harness
//!
//! This module provides command-line functionality for:
//! - Running the pipeline on a replayed still image
//! - Printing and checking configuration files

use apriltag_camera::pipeline::qr_detector::QR_FAMILY;
use apriltag_camera::pipeline::{ChannelDisplay, DisplaySink, PipelineCoordinator, QrGridDetector};
use apriltag_camera::{Config, PresentableImage, VirtualCamera};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long to wait for the first presented frame before giving up
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Display loop tick
const DISPLAY_POLL: Duration = Duration::from_millis(10);

/// Keeps the most recent image, the way a preview surface would
#[derive(Default)]
struct PreviewSink {
    last: Option<PresentableImage>,
    presented: u64,
    detections: usize,
}

impl DisplaySink for PreviewSink {
    fn present(&mut self, image: PresentableImage) {
        self.presented += 1;
        self.detections += image.detection_count;
        self.last = Some(image);
    }
}

/// Run the pipeline on a still image replayed as camera frames
pub fn preview(
    image: &Path,
    config_path: Option<&Path>,
    frames: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if config_path.is_none() {
        // The built-in backend only understands QR grids
        config.detector.family = QR_FAMILY.to_string();
    }

    let source = VirtualCamera::from_image_file(image)?;
    let (display, mut receiver) = ChannelDisplay::new(config.display_queue_depth);

    println!("Replaying: {}", image.display());
    println!(
        "Capture format: {}x{} {}",
        config.capture.width, config.capture.height, config.capture.pixel_format
    );

    let mut pipeline = PipelineCoordinator::new(config, source, QrGridDetector::new(), display)?;
    let status = pipeline.resume()?;
    println!("Detection: {:?}", status);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })?;

    if frames == 0 {
        println!("Previewing... (press Ctrl+C to stop)");
    }

    let start = Instant::now();
    let mut sink = PreviewSink::default();
    while running.load(Ordering::SeqCst) {
        receiver.drain_into(&mut sink);
        if frames > 0 && sink.presented >= frames {
            break;
        }
        if sink.presented == 0 && start.elapsed() > FIRST_FRAME_TIMEOUT {
            pipeline.shutdown();
            return Err("No frames presented, is the pipeline stalled?".into());
        }
        std::thread::sleep(DISPLAY_POLL);
    }

    pipeline.shutdown();
    receiver.drain_into(&mut sink);

    let stats = pipeline.stats();
    let elapsed = start.elapsed().as_secs_f64();
    println!();
    println!("Presented: {} frames in {:.2}s", sink.presented, elapsed);
    println!(
        "Source frames: {} offered, {} dropped, {} failed",
        stats.offered,
        stats.dropped(),
        stats.failed
    );
    println!("Detections drawn: {}", sink.detections);

    if let (Some(path), Some(last)) = (output, sink.last) {
        last.image.save(&path)?;
        println!("Saved to: {}", path.display());
    }

    Ok(())
}

/// Print the default configuration
pub fn print_default_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", Config::default().to_json_string()?);
    Ok(())
}

/// Load and validate a configuration file
pub fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(path)?;
    println!("{}: ok", path.display());
    println!("  capture: {}x{} {}", config.capture.width, config.capture.height, config.capture.pixel_format);
    println!("  detector family: {}", config.detector.family);
    println!("  sensor rotation: {}°", config.sensor_rotation_degrees);
    Ok(())
}
