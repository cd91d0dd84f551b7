use clap::{Parser, Subcommand};
use coverframe::engine::PresetId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coverframe")]
#[command(about = "Embed a cover image into videos as artwork and first frame", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// List the available output presets
    Presets,

    /// Show the tracks, duration and frame rate of a media file
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Estimate the output size of a video under a preset
    Estimate {
        file: PathBuf,

        /// original, telegram-hd or telegram-sd (defaults to config)
        #[arg(short, long)]
        preset: Option<PresetId>,
    },

    /// Run the pre-flight checks without encoding
    Validate {
        video: PathBuf,
        image: PathBuf,

        #[arg(short, long)]
        preset: Option<PresetId>,
    },

    /// Embed an image into one video
    Process {
        video: PathBuf,
        image: PathBuf,

        #[arg(short, long)]
        preset: Option<PresetId>,

        /// Print job snapshots as JSON lines instead of progress text
        #[arg(long)]
        json: bool,
    },

    /// Embed one image into many videos, one at a time
    Batch {
        /// Video files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long)]
        image: PathBuf,

        #[arg(short, long)]
        preset: Option<PresetId>,

        #[arg(long)]
        json: bool,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
