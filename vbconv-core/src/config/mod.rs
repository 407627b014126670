//! Job settings, defaults and named presets.
//!
//! A batch is configured by a single immutable [`JobSettings`] value that is
//! shared across all of its jobs. Settings are only ever produced by
//! [`JobSettingsBuilder::build`], which performs every validation up front so
//! a running batch never discovers a configuration error halfway through.

mod builder;
mod presets;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub use builder::JobSettingsBuilder;
pub use presets::Preset;

// ============================================================================
// DEFAULT CONSTANTS
// ============================================================================

/// Default quantizer for software encoders in CRF mode.
pub const DEFAULT_CRF: u8 = 23;

/// Default quantizer for NVENC encoders in constant-quality mode.
pub const DEFAULT_CQ: u8 = 28;

/// Default target bitrate for CBR/VBR modes.
pub const DEFAULT_BITRATE: &str = "10M";

/// Default NVENC preset (`p5`).
pub const DEFAULT_GPU_PRESET: u8 = 5;

/// Default number of concurrent encoder processes.
pub const DEFAULT_PARALLEL_JOBS: usize = 2;

/// Default AAC bitrate used when re-encoding audio.
pub const DEFAULT_AAC_BITRATE_KBPS: u32 = 192;

/// Highest quantizer accepted by any supported encoder.
pub const MAX_QUALITY_LEVEL: u8 = 51;

/// Source codec admitted by default (files already in another codec are left alone).
pub const DEFAULT_SOURCE_CODEC: &str = "h264";

// ============================================================================
// SETTINGS TYPES
// ============================================================================

/// Target video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Hevc,
    Av1,
    Avc,
    Vp9,
}

impl VideoCodec {
    /// Output file suffix used when none is configured.
    #[must_use]
    pub fn default_suffix(self) -> &'static str {
        match self {
            VideoCodec::Hevc => "_h265",
            VideoCodec::Av1 => "_av1",
            VideoCodec::Avc => "_avc",
            VideoCodec::Vp9 => "_vp9",
        }
    }

    /// Encoder name for this codec, or `None` when no such encoder exists.
    #[must_use]
    pub fn encoder(self, hardware: bool) -> Option<&'static str> {
        match (self, hardware) {
            (VideoCodec::Hevc, false) => Some("libx265"),
            (VideoCodec::Hevc, true) => Some("hevc_nvenc"),
            (VideoCodec::Av1, false) => Some("libaom-av1"),
            (VideoCodec::Av1, true) => Some("av1_nvenc"),
            (VideoCodec::Avc, false) => Some("libx264"),
            (VideoCodec::Avc, true) => Some("h264_nvenc"),
            (VideoCodec::Vp9, false) => Some("libvpx-vp9"),
            (VideoCodec::Vp9, true) => None,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoCodec::Hevc => "HEVC",
            VideoCodec::Av1 => "AV1",
            VideoCodec::Avc => "AVC",
            VideoCodec::Vp9 => "VP9",
        };
        f.write_str(name)
    }
}

impl FromStr for VideoCodec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hevc" | "h265" | "h.265" => Ok(VideoCodec::Hevc),
            "av1" => Ok(VideoCodec::Av1),
            "avc" | "h264" | "h.264" => Ok(VideoCodec::Avc),
            "vp9" => Ok(VideoCodec::Vp9),
            other => Err(CoreError::Config(format!("Unknown video codec '{other}'"))),
        }
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Keep the source dimensions.
    Original,
    /// Fix the output height; width follows the aspect ratio.
    Height(u32),
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Original => f.write_str("original"),
            Resolution::Height(height) => write!(f, "{height}p"),
        }
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        if lowered == "original" {
            return Ok(Resolution::Original);
        }
        let digits = lowered.strip_suffix('p').unwrap_or(&lowered);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Resolution::Height(height)),
            _ => Err(CoreError::Config(format!(
                "Invalid resolution '{s}' (expected 'original' or a height such as '1080p')"
            ))),
        }
    }
}

/// Rate-control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateControl {
    /// NVENC constant quantizer (`-cq`).
    ConstantQuality,
    /// Software constant rate factor (`-crf`).
    ConstantRateFactor,
    ConstantBitrate,
    VariableBitrate,
}

impl RateControl {
    /// True for the modes driven by a quantizer level rather than a bitrate.
    #[must_use]
    pub fn is_quantizer(self) -> bool {
        matches!(self, RateControl::ConstantQuality | RateControl::ConstantRateFactor)
    }

    /// Whether this mode is offered by hardware (`true`) or software encoders.
    #[must_use]
    pub fn supported_by(self, hardware: bool) -> bool {
        match self {
            RateControl::ConstantQuality => hardware,
            RateControl::ConstantRateFactor => !hardware,
            RateControl::ConstantBitrate | RateControl::VariableBitrate => true,
        }
    }

    /// Default quality value for this mode.
    #[must_use]
    pub fn default_quality(self) -> QualityValue {
        match self {
            RateControl::ConstantRateFactor => QualityValue::Level(DEFAULT_CRF),
            RateControl::ConstantQuality => QualityValue::Level(DEFAULT_CQ),
            RateControl::ConstantBitrate | RateControl::VariableBitrate => {
                QualityValue::Bitrate(DEFAULT_BITRATE.to_string())
            }
        }
    }

    /// Default mode for hardware or software encoders.
    #[must_use]
    pub fn default_for(hardware: bool) -> Self {
        if hardware {
            RateControl::ConstantQuality
        } else {
            RateControl::ConstantRateFactor
        }
    }
}

impl fmt::Display for RateControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateControl::ConstantQuality => "CQP",
            RateControl::ConstantRateFactor => "CRF",
            RateControl::ConstantBitrate => "CBR",
            RateControl::VariableBitrate => "VBR",
        };
        f.write_str(name)
    }
}

impl FromStr for RateControl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cqp" | "cq" => Ok(RateControl::ConstantQuality),
            "crf" => Ok(RateControl::ConstantRateFactor),
            "cbr" => Ok(RateControl::ConstantBitrate),
            "vbr" => Ok(RateControl::VariableBitrate),
            other => Err(CoreError::Config(format!("Unknown rate control '{other}'"))),
        }
    }
}

/// Quality target: a quantizer level or a bitrate string such as `10M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityValue {
    Level(u8),
    Bitrate(String),
}

impl QualityValue {
    /// Parses a user-supplied value: plain integers become levels, anything
    /// else must be a well-formed bitrate.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<u8>() {
            return Ok(QualityValue::Level(level));
        }
        if is_valid_bitrate(trimmed) {
            Ok(QualityValue::Bitrate(trimmed.to_string()))
        } else {
            Err(CoreError::Config(format!("Invalid quality value '{s}'")))
        }
    }
}

impl fmt::Display for QualityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityValue::Level(level) => write!(f, "{level}"),
            QualityValue::Bitrate(rate) => f.write_str(rate),
        }
    }
}

/// Checks `<digits>[.digits][K|M|G]` (unit letter case-insensitive).
#[must_use]
pub fn is_valid_bitrate(value: &str) -> bool {
    let number = match value.chars().last() {
        Some(c) if matches!(c.to_ascii_uppercase(), 'K' | 'M' | 'G') => &value[..value.len() - 1],
        _ => value,
    };
    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    all_digits(whole) && frac.map_or(true, all_digits)
}

/// Audio handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioMode {
    /// Pass the source audio through untouched.
    Copy,
    /// Re-encode to AAC at the given bitrate.
    Aac { bitrate_kbps: u32 },
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    Mkv,
}

impl Container {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
        }
    }
}

impl FromStr for Container {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_start_matches('.') {
            "mp4" => Ok(Container::Mp4),
            "mkv" => Ok(Container::Mkv),
            other => Err(CoreError::Config(format!("Unsupported container '{other}'"))),
        }
    }
}

// ============================================================================
// JOB SETTINGS
// ============================================================================

/// Validated settings shared by every job in a batch.
///
/// Construct through [`JobSettingsBuilder`]:
///
/// ```rust
/// use vbconv_core::config::{JobSettingsBuilder, VideoCodec, Resolution};
///
/// let settings = JobSettingsBuilder::new()
///     .codec(VideoCodec::Av1)
///     .hardware(false)
///     .resolution(Resolution::Height(1080))
///     .build()
///     .unwrap();
/// assert_eq!(settings.suffix, "_av1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    pub codec: VideoCodec,
    /// NVENC instead of a software encoder
    pub hardware: bool,
    pub resolution: Resolution,
    /// NVENC preset number, `1..=7`
    pub gpu_preset: u8,
    pub rate_control: RateControl,
    pub quality: QualityValue,
    pub audio: AudioMode,
    pub container: Container,
    /// Appended to the input file stem
    pub suffix: String,
    pub parallel_jobs: usize,
}

impl JobSettings {
    /// Output path for `input`: same directory, stem + suffix, container extension.
    pub fn output_path_for(&self, input: &Path) -> Result<PathBuf, CoreError> {
        let stem = input.file_stem().ok_or_else(|| {
            CoreError::PathError(format!("Failed to get file stem for {}", input.display()))
        })?;
        let mut file_name = stem.to_os_string();
        file_name.push(&self.suffix);
        file_name.push(".");
        file_name.push(self.container.extension());
        Ok(input.with_file_name(file_name))
    }

    /// The encoder this batch runs, if the codec/hardware pair has one.
    #[must_use]
    pub fn encoder(&self) -> Option<&'static str> {
        self.codec.encoder(self.hardware)
    }
}
