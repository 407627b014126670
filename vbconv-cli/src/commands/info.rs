//! Implementation of the 'info' subcommand.
//!
//! Prints container and stream details for each file using ffprobe.

use crate::cli::InfoArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::output;

use vbconv_core::tools::locate_tool;
use vbconv_core::utils::display_name;
use vbconv_core::{format_bytes, format_duration, CoreError, FfprobeProber, MediaInfo, MediaProber};

use serde_json::json;

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

fn print_media_info(name: &str, info: &MediaInfo) {
    output::print_section(name);
    output::print_status("Size", &format_bytes(info.file_size));
    output::print_status(
        "Duration",
        &info
            .duration_secs
            .map_or_else(|| "unknown".to_string(), format_duration),
    );
    let resolution = match (info.width, info.height) {
        (Some(w), Some(h)) => format!("{w}x{h}"),
        _ => "unknown".to_string(),
    };
    output::print_status("Resolution", &resolution);
    output::print_status("Video codec", &or_unknown(info.video_codec.as_deref()));
    output::print_status(
        "Video bitrate",
        &or_unknown(info.video_bitrate_kbps.map(|kbps| format!("{kbps} kb/s"))),
    );
    output::print_status("Audio codec", &or_unknown(info.audio_codec.as_deref()));
    output::print_status(
        "Audio bitrate",
        &or_unknown(info.audio_bitrate_kbps.map(|kbps| format!("{kbps} kb/s"))),
    );
    output::print_status("Channels", &or_unknown(info.audio_channels));
}

/// Runs the info command.
pub fn run_info(args: InfoArgs) -> CliResult<()> {
    for file in &args.files {
        if !file.is_file() {
            return Err(CoreError::PathError(format!(
                "{} is not a file",
                file.display()
            )));
        }
    }

    let ffprobe = locate_tool("ffprobe", args.tools.ffprobe.as_deref())?;
    let prober = FfprobeProber::new(ffprobe);

    let mut reports = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let info = prober
            .media_info(file)
            .cli_with_context(|| format!("Failed to read {}", file.display()))?;
        if args.json {
            reports.push(json!({ "path": file, "info": info }));
        } else {
            print_media_info(&display_name(file), &info);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}
