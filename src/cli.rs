use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidcore")]
#[command(author, version, about = "Video playback core: inspect MP4 files and run headless playback")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrackArg {
    Video,
    Audio,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe a media file and display its sample index summary
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the samples of one track
    Samples {
        /// File to read
        #[arg(required = true)]
        file: PathBuf,

        /// Track to list
        #[arg(long, value_enum, default_value = "video")]
        track: TrackArg,

        /// Maximum number of rows to print
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Play a file headless on the null backends and report progress
    Simulate {
        /// File to play
        #[arg(required = true)]
        file: PathBuf,

        /// Simulated wall-clock seconds to run
        #[arg(short, long, default_value = "5")]
        seconds: f64,

        /// Loop playback at end of media
        #[arg(long = "loop")]
        looping: bool,

        /// Print one JSON object per reported second
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
