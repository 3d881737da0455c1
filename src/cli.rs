use clap::{Args, Parser, Subcommand};
use sf_core::{SplitSpec, MIN_TARGET_SECONDS};
use splitforge::duration::parse_duration;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "splitforge")]
#[command(author, version, about = "Split media files into parts")]
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

#[derive(Subcommand)]
pub enum Commands {
    /// Split a media file into parts
    Split {
        /// Input media file
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        mode: ModeArgs,

        /// Re-encode each part for frame-accurate cuts (slower)
        #[arg(long)]
        reencode: bool,

        /// Video quality when re-encoding (0-51, lower is better)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=51))]
        crf: Option<u8>,

        /// Audio bitrate when re-encoding, e.g. 128k
        #[arg(long)]
        audio_bitrate: Option<String>,

        /// Directory to write parts into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Replace existing files in the output directory
        #[arg(long)]
        overwrite: bool,

        /// Extend each part after the first backwards by this fraction of the
        /// part length (0 to 0.5)
        #[arg(long)]
        overlap: Option<f64>,
    },

    /// Show the parts a split would produce, without producing them
    Plan {
        /// Input media file
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        mode: ModeArgs,

        /// Window overlap ratio (0 to 0.5)
        #[arg(long)]
        overlap: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file and display its duration
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Exactly one way of dividing the timeline.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ModeArgs {
    /// Split into N equal parts (at least 2)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(2..))]
    pub parts: Option<u32>,

    /// Split into parts of roughly N megabytes (at least 1)
    #[arg(short = 's', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub size_mb: Option<u64>,

    /// Split into parts of this length, e.g. 90, 1m30s (at least 10s)
    #[arg(short, long, value_parser = parse_part_duration)]
    pub duration: Option<f64>,
}

impl ModeArgs {
    pub fn spec(&self) -> SplitSpec {
        match (self.parts, self.size_mb, self.duration) {
            (Some(count), _, _) => SplitSpec::Parts { count },
            (_, Some(target_mb), _) => SplitSpec::BySize { target_mb },
            (_, _, Some(target_seconds)) => SplitSpec::ByTime { target_seconds },
            (None, None, None) => unreachable!("clap requires one of --parts, --size-mb, --duration"),
        }
    }
}

fn parse_part_duration(value: &str) -> Result<f64, String> {
    let secs = parse_duration(value).map_err(|e| e.to_string())?;
    if secs < MIN_TARGET_SECONDS {
        return Err(format!(
            "part duration must be at least {MIN_TARGET_SECONDS}s, got {secs}s"
        ));
    }
    Ok(secs)
}
