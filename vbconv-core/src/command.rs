//! Encoder argument construction.
//!
//! Maps validated [`JobSettings`] plus an input/output pair to the ffmpeg
//! argument list. The mapping is pure: the same inputs always produce the
//! same list, and nothing here touches the file system. The program itself is
//! not part of the list.

use std::path::Path;

use crate::config::{AudioMode, JobSettings, RateControl, Resolution};
use crate::error::{CoreError, CoreResult};

/// Builds the ffmpeg arguments for encoding `input` into `output`.
///
/// # Errors
///
/// Returns `CoreError::UnsupportedEncoder` when the codec/hardware pair has no
/// encoder. Settings produced by the builder never hit this.
pub fn build_encoder_args(
    settings: &JobSettings,
    input: &Path,
    output: &Path,
) -> CoreResult<Vec<String>> {
    let encoder = settings
        .encoder()
        .ok_or_else(|| CoreError::UnsupportedEncoder {
            codec: settings.codec.to_string(),
            hardware: settings.hardware,
        })?;

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        "-c:v".into(),
        encoder.into(),
    ];

    if let Resolution::Height(height) = settings.resolution {
        args.push("-vf".into());
        args.push(format!("scale=-2:{height}"));
    }

    let quality = settings.quality.to_string();
    if settings.hardware {
        args.push("-preset".into());
        args.push(format!("p{}", settings.gpu_preset));
        if settings.rate_control == RateControl::ConstantQuality {
            args.push("-cq".into());
        } else {
            args.push("-b:v".into());
        }
    } else if settings.rate_control == RateControl::ConstantRateFactor {
        args.push("-crf".into());
    } else {
        args.push("-b:v".into());
    }
    args.push(quality);

    match settings.audio {
        AudioMode::Copy => {
            args.push("-c:a".into());
            args.push("copy".into());
        }
        AudioMode::Aac { bitrate_kbps } => {
            args.push("-c:a".into());
            args.push("aac".into());
            args.push("-b:a".into());
            args.push(format!("{bitrate_kbps}k"));
        }
    }

    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// Renders a program and its arguments as a single shell-like line for logs.
#[must_use]
pub fn format_command_line(program: &str, args: &[String]) -> String {
    let mut line = quote_arg(program);
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg));
    }
    line
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}
