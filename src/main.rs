// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use depthcam::presets::VisualPreset;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depthcam")]
#[command(about = "Diagnostics and live viewing for depth cameras")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected depth cameras and their stream modes
    List,

    /// Run the full diagnostic and print a report
    Diagnose,

    /// Negotiate a session and sample a few frame sets
    Probe,

    /// Capture one frame set and save it as a PNG
    Snapshot {
        /// Output file or directory (default: ~/Pictures/DepthCam)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Live depth viewer in the terminal
    View,

    /// Print the center-pixel distance until interrupted
    Monitor {
        /// Sampling interval in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Apply a depth visual preset
    Preset {
        /// Preset to apply
        #[arg(value_enum)]
        preset: VisualPreset,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depthcam=debug, RUST_LOG=info
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
        Commands::List => cli::list(),
        Commands::Diagnose => cli::diagnose(),
        Commands::Probe => cli::probe(),
        Commands::Snapshot { output } => cli::snapshot(output),
        Commands::View => cli::view(),
        Commands::Monitor { interval_ms } => cli::monitor(interval_ms),
        Commands::Preset { preset } => cli::preset(preset),
        Commands::Config { init } => cli::config(init),
    }
}
