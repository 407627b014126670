// vbconv-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use vbconv_core::config::DEFAULT_SOURCE_CODEC;
use vbconv_core::{Container, Preset, RateControl, Resolution, VideoCodec};

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "vbconv: batch video converter",
    long_about = "Converts batches of video files with ffmpeg, running several encodes in parallel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug output on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Level written to the log file (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        env = "VBCONV_LOG_LEVEL",
        default_value = "info"
    )]
    pub log_level: LevelFilter,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Converts every matching video file under the given paths
    Encode(EncodeArgs),
    /// Shows stream information for video files
    Info(InfoArgs),
    /// Lists the built-in presets
    Presets,
}

/// Overrides for the ffmpeg/ffprobe binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// Path to the ffmpeg binary (defaults to the bundled copy, then PATH)
    #[arg(long, value_name = "PATH", env = "VBCONV_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary (defaults to the bundled copy, then PATH)
    #[arg(long, value_name = "PATH", env = "VBCONV_FFPROBE")]
    pub ffprobe: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Video files or directories to convert (directories are searched recursively)
    #[arg(required = true, value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Start from a named preset; other options override its values
    #[arg(short, long, value_name = "NAME", value_parser = parse_preset)]
    pub preset: Option<Preset>,

    // --- Video ---
    /// Target codec (hevc, av1, avc, vp9)
    #[arg(short, long, value_name = "CODEC")]
    pub codec: Option<VideoCodec>,

    /// Encode on the CPU instead of NVENC
    #[arg(long, conflicts_with = "gpu")]
    pub cpu: bool,

    /// Encode with NVENC
    #[arg(long)]
    pub gpu: bool,

    /// Output height such as 1080p, or "original"
    #[arg(short, long, value_name = "RES")]
    pub resolution: Option<Resolution>,

    /// NVENC preset p1 (fastest) to p7 (best)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=7))]
    pub gpu_preset: Option<u8>,

    /// Rate control mode (cqp, crf, cbr, vbr)
    #[arg(long, value_name = "MODE")]
    pub rate_control: Option<RateControl>,

    /// Quality level (0-51) for cqp/crf, or a bitrate such as 8M for cbr/vbr
    #[arg(short, long, value_name = "VALUE")]
    pub quality: Option<String>,

    // --- Audio ---
    /// Re-encode audio to AAC at the given bitrate in kbit/s
    #[arg(
        long,
        value_name = "KBPS",
        num_args = 0..=1,
        default_missing_value = "192",
        conflicts_with = "copy_audio"
    )]
    pub aac: Option<u32>,

    /// Pass the source audio through untouched
    #[arg(long)]
    pub copy_audio: bool,

    // --- Output ---
    /// Output container (mp4, mkv)
    #[arg(long, value_name = "EXT")]
    pub container: Option<Container>,

    /// Text appended to each output file name (defaults per codec, e.g. _h265)
    #[arg(short, long, value_name = "TEXT")]
    pub suffix: Option<String>,

    /// Number of files converted at the same time
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Only convert files whose video stream uses this codec
    #[arg(long, value_name = "CODEC", default_value = DEFAULT_SOURCE_CODEC)]
    pub source_codec: String,

    /// Print events as JSON lines on stdout instead of progress bars
    #[arg(long)]
    pub json: bool,

    /// Directory for log files (defaults to <first input dir>/logs)
    #[arg(short, long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Video files to inspect
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Print the information as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

fn parse_preset(value: &str) -> Result<Preset, String> {
    value.parse::<Preset>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_encode_args_parse() {
        let cli = Cli::try_parse_from([
            "vbconv",
            "encode",
            "videos",
            "--preset",
            "youtube-720p",
            "--cpu",
            "--aac",
            "-j",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Encode(args) => {
                assert_eq!(args.preset, Some(Preset::Youtube720p));
                assert!(args.cpu);
                assert_eq!(args.aac, Some(192));
                assert_eq!(args.jobs, Some(3));
                assert_eq!(args.source_codec, "h264");
                assert_eq!(args.inputs, vec![PathBuf::from("videos")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cpu_and_gpu_conflict() {
        let result = Cli::try_parse_from(["vbconv", "encode", "a.mp4", "--cpu", "--gpu"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let result = Cli::try_parse_from(["vbconv", "encode", "a.mp4", "--preset", "nope"]);
        assert!(result.is_err());
    }
}
