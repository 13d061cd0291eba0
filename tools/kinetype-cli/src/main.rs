//! Kinetype CLI: command-line interface for lyric-video export.
//!
//! Usage:
//!   kinetype export [OPTIONS] --end-ms <MS> -o <FILE>   Render a test-pattern video
//!   kinetype estimate [OPTIONS] --end-ms <MS>           Frame and memory estimate
//!   kinetype check                                      Check encoder availability
//!   kinetype config [--init]                            Show or create configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kinetype_common::config::{AppConfig, LoggingConfig, QualityPreset};

mod commands;

#[derive(Parser)]
#[command(
    name = "kinetype",
    about = "Deterministic frame-exact video export for lyric animations",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log how long each export phase took
    #[arg(long, global = true)]
    timings: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Timeline range and output format shared by `export` and `estimate`.
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Start of the exported range (ms)
    #[arg(long, default_value = "0")]
    pub start_ms: f64,

    /// End of the exported range (ms)
    #[arg(long)]
    pub end_ms: f64,

    /// Output frame rate (config default when omitted)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Output width
    #[arg(long, default_value = "1920")]
    pub width: u32,

    /// Output height
    #[arg(long, default_value = "1080")]
    pub height: u32,

    /// Frames per encoded segment (config default when omitted)
    #[arg(long)]
    pub batch_size: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the built-in test pattern to a video file
    Export {
        #[command(flatten)]
        range: RangeArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Audio track to mux into the output
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Batch encodes allowed in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Encoder quality: draft|standard|high
        #[arg(long)]
        quality: Option<QualityPreset>,

        /// Draw overlays into captured frames
        #[arg(long)]
        overlays: bool,

        /// Parent directory for the session working directory
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Estimate frame count, batches and memory for a range
    Estimate {
        #[command(flatten)]
        range: RangeArgs,

        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check encoder availability
    Check,

    /// Show the effective configuration
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let logging = LoggingConfig {
        level: if cli.verbose {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        },
        phase_timings: cli.timings || config.logging.phase_timings,
        ..config.logging.clone()
    };
    kinetype_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export {
            range,
            output,
            audio,
            concurrency,
            quality,
            overlays,
            work_dir,
        } => {
            commands::export::run(
                config,
                commands::export::ExportOptions {
                    range,
                    output,
                    audio,
                    concurrency,
                    quality,
                    overlays,
                    work_dir,
                },
            )
            .await
        }
        Commands::Estimate { range, json } => commands::estimate::run(&config, range, json),
        Commands::Check => commands::check::run(&config).await,
        Commands::Config { init } => commands::config::run(config, init),
    }
}
