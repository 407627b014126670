//! Named settings bundles for common targets.

use std::fmt;
use std::str::FromStr;

use super::{
    AudioMode, Container, JobSettings, JobSettingsBuilder, QualityValue, RateControl, Resolution,
    VideoCodec, DEFAULT_AAC_BITRATE_KBPS, DEFAULT_PARALLEL_JOBS,
};
use crate::error::CoreError;

/// A complete, named configuration.
///
/// Presets only seed a [`JobSettingsBuilder`]; individual options applied
/// afterwards override the preset's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// General use and archiving: HEVC on NVENC, original resolution, MKV.
    Balanced,
    /// AV1 on NVENC at 1080p for Apple devices.
    AppleAv1,
    /// Software VP9 at 1080p for Android devices.
    AndroidVp9,
    /// HEVC VBR 10M with AAC audio at 1080p for uploads.
    Youtube1080p,
    /// HEVC VBR 6M with AAC audio at 720p for uploads.
    Youtube720p,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Balanced,
        Preset::AppleAv1,
        Preset::AndroidVp9,
        Preset::Youtube1080p,
        Preset::Youtube720p,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Preset::Balanced => "balanced",
            Preset::AppleAv1 => "apple-av1",
            Preset::AndroidVp9 => "android-vp9",
            Preset::Youtube1080p => "youtube-1080p",
            Preset::Youtube720p => "youtube-720p",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Preset::Balanced => "General use / archiving (HEVC GPU, original size, MKV)",
            Preset::AppleAv1 => "Apple devices (AV1 GPU, 1080p, MP4)",
            Preset::AndroidVp9 => "Android devices (VP9 CPU, 1080p, MP4)",
            Preset::Youtube1080p => "YouTube upload (HEVC GPU, 1080p, VBR 10M, AAC)",
            Preset::Youtube720p => "YouTube upload (HEVC GPU, 720p, VBR 6M, AAC)",
        }
    }

    /// A builder seeded with this preset's values.
    #[must_use]
    pub fn builder(self) -> JobSettingsBuilder {
        let base = JobSettingsBuilder::new().parallel_jobs(DEFAULT_PARALLEL_JOBS);
        let aac = AudioMode::Aac {
            bitrate_kbps: DEFAULT_AAC_BITRATE_KBPS,
        };
        match self {
            Preset::Balanced => base
                .codec(VideoCodec::Hevc)
                .hardware(true)
                .resolution(Resolution::Original)
                .gpu_preset(5)
                .rate_control(RateControl::ConstantQuality)
                .quality(QualityValue::Level(28))
                .audio(AudioMode::Copy)
                .container(Container::Mkv),
            Preset::AppleAv1 => base
                .codec(VideoCodec::Av1)
                .hardware(true)
                .resolution(Resolution::Height(1080))
                .gpu_preset(5)
                .rate_control(RateControl::ConstantQuality)
                .quality(QualityValue::Level(29))
                .audio(AudioMode::Copy)
                .container(Container::Mp4),
            Preset::AndroidVp9 => base
                .codec(VideoCodec::Vp9)
                .hardware(false)
                .resolution(Resolution::Height(1080))
                .rate_control(RateControl::ConstantRateFactor)
                .quality(QualityValue::Level(31))
                .audio(AudioMode::Copy)
                .container(Container::Mp4),
            Preset::Youtube1080p => base
                .codec(VideoCodec::Hevc)
                .hardware(true)
                .resolution(Resolution::Height(1080))
                .gpu_preset(6)
                .rate_control(RateControl::VariableBitrate)
                .quality(QualityValue::Bitrate("10M".to_string()))
                .audio(aac)
                .container(Container::Mp4),
            Preset::Youtube720p => base
                .codec(VideoCodec::Hevc)
                .hardware(true)
                .resolution(Resolution::Height(720))
                .gpu_preset(6)
                .rate_control(RateControl::VariableBitrate)
                .quality(QualityValue::Bitrate("6M".to_string()))
                .audio(aac)
                .container(Container::Mp4),
        }
    }

    /// The preset whose encoding values equal `settings`, ignoring suffix
    /// and parallelism.
    #[must_use]
    pub fn matching(settings: &JobSettings) -> Option<Preset> {
        Preset::ALL.into_iter().find(|preset| {
            preset
                .builder()
                .max_parallel_jobs(usize::MAX)
                .build()
                .map(|p| {
                    p.codec == settings.codec
                        && p.hardware == settings.hardware
                        && p.resolution == settings.resolution
                        && (!p.hardware || p.gpu_preset == settings.gpu_preset)
                        && p.rate_control == settings.rate_control
                        && p.quality == settings.quality
                        && p.audio == settings.audio
                        && p.container == settings.container
                })
                .unwrap_or(false)
        })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                CoreError::Config(format!(
                    "Unknown preset '{s}' (available: {})",
                    names.join(", ")
                ))
            })
    }
}
