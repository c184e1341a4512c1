//! Clipgrid CLI: split videos and compose grid templates for social platforms.
//!
//! Usage:
//!   clipgrid split -i <INPUT> -o <DIR>        Split a video into chunks
//!   clipgrid apply-template -o <OUT> <INPUTS>  Compose inputs into a 1x1/2x2/3x1 grid
//!   clipgrid platforms                         List platform profiles
//!   clipgrid info <PATH>                       Show probed media information
//!   clipgrid check                             Check the media engine

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clipgrid_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipgrid",
    about = "Split and compose videos within social platform limits",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a video into fixed-length chunks
    Split {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Duration of each chunk in seconds
        #[arg(short, long, default_value = "15")]
        duration: u32,

        /// Offset to skip from the start (e.g. 10s, 1m30s)
        #[arg(short, long, default_value = "")]
        skip: String,

        /// Target platform (see `clipgrid platforms`)
        #[arg(short = 't', long)]
        target_platform: Option<String>,

        /// Output format: mp4|webm
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Compose input videos into a grid template
    ApplyTemplate {
        /// Input videos, in row-major cell order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output video path
        #[arg(short, long)]
        output: PathBuf,

        /// Template type: 1x1|2x2|3x1
        #[arg(long, default_value = "2x2")]
        video_template: String,

        /// Output format: mp4|webm
        #[arg(short, long)]
        format: Option<String>,

        /// Zoom, grade and pitch-shift every input before composing
        #[arg(long)]
        obscurify: bool,

        /// Text drawn over the composition
        #[arg(long)]
        text: Option<String>,

        /// Corner of the text: top-left|top-right|bottom-left|bottom-right
        #[arg(long, default_value = "bottom-right")]
        text_corner: String,

        /// Text colour (random from the palette when omitted)
        #[arg(long)]
        text_color: Option<String>,

        /// Target platform (see `clipgrid platforms`)
        #[arg(short = 't', long)]
        target_platform: Option<String>,

        /// Outro card line (repeatable)
        #[arg(long = "outro")]
        outro: Vec<String>,

        /// Seed for the random text colour
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List platform profiles
    Platforms {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show probed media information
    Info {
        /// Path to the media file
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the media engine is usable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(clipgrid_common::config::config_file_path);
    let (mut config, config_warning) = AppConfig::read_or_default(&config_path);

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipgrid_common::logging::init_logging(&config.logging);
    if let Some(warning) = config_warning {
        tracing::warn!("{warning}");
    }
    tracing::debug!(config = %config_path.display(), "Loaded configuration");

    clipgrid_platform_core::init_global(&config.extra_profiles)
        .map_err(|e| anyhow::anyhow!("Failed to load platform profiles: {e}"))?;

    match cli.command {
        Commands::Split {
            input,
            output,
            duration,
            skip,
            target_platform,
            format,
        } => commands::split::run(config, input, output, duration, skip, target_platform, format).await,
        Commands::ApplyTemplate {
            inputs,
            output,
            video_template,
            format,
            obscurify,
            text,
            text_corner,
            text_color,
            target_platform,
            outro,
            seed,
        } => {
            commands::template::run(
                config,
                commands::template::TemplateArgs {
                    inputs,
                    output,
                    template: video_template,
                    format,
                    obscurify,
                    text,
                    text_corner,
                    text_color,
                    platform: target_platform,
                    outro,
                    seed,
                },
            )
            .await
        }
        Commands::Platforms { json } => commands::platforms::run(json),
        Commands::Info { path, json } => commands::info::run(&config, path, json),
        Commands::Check => commands::check::run(&config),
    }
}
