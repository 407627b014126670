//! Media inspection through ffprobe.
//!
//! The engine only needs two facts about an input: the codec of its first
//! video stream (the admission filter) and its duration (progress
//! reporting). Both lookups are best effort; any failure is logged and
//! degraded to "unknown" so a bad file never aborts a batch. The fuller
//! [`MediaInfo`] lookup backs the `info` command and does report errors.

use std::path::{Path, PathBuf};
use std::process::Command;

use ffprobe::{FfProbe, FfProbeError};
use log::{debug, warn};
use serde::Serialize;

use crate::error::{command_failed_error, command_start_error, CoreError, CoreResult};

/// Read-only media inspection used by discovery, jobs and the `info` command.
pub trait MediaProber: Send + Sync {
    /// Codec name of the first video stream, `None` when it cannot be determined.
    fn video_codec(&self, path: &Path) -> Option<String>;

    /// Container duration in seconds, `0.0` when unknown.
    fn duration_secs(&self, path: &Path) -> f64;

    /// Summary of the file's streams.
    fn media_info(&self, path: &Path) -> CoreResult<MediaInfo>;
}

/// Stream summary shown by the `info` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    pub file_size: u64,
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<String>,
    pub video_bitrate_kbps: Option<u64>,
    pub audio_codec: Option<String>,
    pub audio_bitrate_kbps: Option<u64>,
    pub audio_channels: Option<u32>,
}

/// [`MediaProber`] running a configured ffprobe binary and decoding its JSON
/// into the `ffprobe` crate's types.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProber {
    /// A prober running the given ffprobe binary.
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    #[must_use]
    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    fn run(&self, path: &Path) -> Result<FfProbe, FfProbeError> {
        debug!(
            "Running {} on {}",
            self.ffprobe_path.display(),
            path.display()
        );
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-show_format",
                "-show_streams",
                "-print_format",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(FfProbeError::Io)?;
        if !output.status.success() {
            return Err(FfProbeError::Status(output));
        }
        serde_json::from_slice::<FfProbe>(&output.stdout).map_err(FfProbeError::Deserialize)
    }
}

impl MediaProber for FfprobeProber {
    fn video_codec(&self, path: &Path) -> Option<String> {
        match self.run(path) {
            Ok(metadata) => {
                let codec = first_video_codec(&metadata);
                if codec.is_none() {
                    warn!("No video stream found in {}", path.display());
                }
                codec
            }
            Err(err) => {
                warn!("Could not determine codec of {}: {err:?}", path.display());
                None
            }
        }
    }

    fn duration_secs(&self, path: &Path) -> f64 {
        match self.run(path) {
            Ok(metadata) => parse_duration(metadata.format.duration.as_deref()),
            Err(err) => {
                warn!("Could not determine duration of {}: {err:?}", path.display());
                0.0
            }
        }
    }

    fn media_info(&self, path: &Path) -> CoreResult<MediaInfo> {
        let file_size = std::fs::metadata(path)?.len();
        let metadata = self
            .run(path)
            .map_err(|err| map_ffprobe_error(err, "media info"))?;
        Ok(summarize(&metadata, file_size))
    }
}

fn first_video_codec(metadata: &FfProbe) -> Option<String> {
    metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| s.codec_name.clone())
        .filter(|name| !name.trim().is_empty())
}

/// Parses an ffprobe duration string; anything unusable becomes `0.0`.
fn parse_duration(raw: Option<&str>) -> f64 {
    raw.and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0)
}

fn kbps(bit_rate: Option<&str>) -> Option<u64> {
    bit_rate
        .and_then(|b| b.trim().parse::<u64>().ok())
        .map(|bps| bps / 1000)
}

fn non_negative(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn summarize(metadata: &FfProbe, file_size: u64) -> MediaInfo {
    let duration = parse_duration(metadata.format.duration.as_deref());
    let mut info = MediaInfo {
        file_size,
        duration_secs: (duration > 0.0).then_some(duration),
        ..Default::default()
    };

    if let Some(video) = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
    {
        info.width = non_negative(video.width);
        info.height = non_negative(video.height);
        info.video_codec = video.codec_name.clone();
        info.video_bitrate_kbps = kbps(video.bit_rate.as_deref());
    }

    if let Some(audio) = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
    {
        info.audio_codec = audio.codec_name.clone();
        info.audio_bitrate_kbps = kbps(audio.bit_rate.as_deref());
        info.audio_channels = non_negative(audio.channels);
    }

    info
}

fn map_ffprobe_error(err: FfProbeError, context: &str) -> CoreError {
    match err {
        FfProbeError::Io(io_err) => command_start_error(format!("ffprobe ({context})"), io_err),
        FfProbeError::Status(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            command_failed_error(format!("ffprobe ({context})"), output.status, stderr)
        }
        FfProbeError::Deserialize(err) => {
            CoreError::FfprobeParse(format!("ffprobe {context} output: {err}"))
        }
        _ => CoreError::FfprobeParse(format!("Unknown ffprobe error during {context}: {err:?}")),
    }
}
