// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "apriltag-camera")]
#[command(about = "Fiducial-marker preview pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a still image as a camera stream and save the annotated preview
    Preview {
        /// Image to replay as camera frames
        #[arg(short, long)]
        image: PathBuf,

        /// Pipeline config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many presented frames (0 = until Ctrl+C)
        #[arg(short, long, default_value = "30")]
        frames: u64,

        /// Where to save the last presented frame (PNG)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as JSON
    DefaultConfig,

    /// Validate a configuration file
    CheckConfig {
        /// Config file to check
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=apriltag_camera=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview {
            image,
            config,
            frames,
            output,
        } => cli::preview(&image, config.as_deref(), frames, output),
        Commands::DefaultConfig => cli::print_default_config(),
        Commands::CheckConfig { path } => cli::check_config(&path),
    }
}
