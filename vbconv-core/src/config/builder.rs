//! Builder for [`JobSettings`].
//!
//! All settings validation lives in [`JobSettingsBuilder::build`]. Fields the
//! caller leaves unset are derived from the ones it did set: the rate-control
//! mode follows the hardware choice, the quality follows the rate-control
//! mode, and the suffix follows the codec.

use log::warn;

use super::{
    is_valid_bitrate, AudioMode, Container, JobSettings, QualityValue, RateControl, Resolution,
    VideoCodec, DEFAULT_GPU_PRESET, DEFAULT_PARALLEL_JOBS, MAX_QUALITY_LEVEL,
};
use crate::error::{CoreError, CoreResult};

/// Builder for creating validated [`JobSettings`].
#[derive(Debug, Clone)]
pub struct JobSettingsBuilder {
    codec: VideoCodec,
    hardware: bool,
    resolution: Resolution,
    gpu_preset: u8,
    rate_control: Option<RateControl>,
    quality: Option<QualityValue>,
    audio: AudioMode,
    container: Container,
    suffix: Option<String>,
    parallel_jobs: usize,
    max_parallel_jobs: Option<usize>,
}

impl Default for JobSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSettingsBuilder {
    /// Creates a builder for HEVC on NVENC at the original resolution with
    /// audio passthrough into MP4.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codec: VideoCodec::Hevc,
            hardware: true,
            resolution: Resolution::Original,
            gpu_preset: DEFAULT_GPU_PRESET,
            rate_control: None,
            quality: None,
            audio: AudioMode::Copy,
            container: Container::Mp4,
            suffix: None,
            parallel_jobs: DEFAULT_PARALLEL_JOBS,
            max_parallel_jobs: None,
        }
    }

    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn hardware(mut self, hardware: bool) -> Self {
        self.hardware = hardware;
        self
    }

    #[must_use]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub fn gpu_preset(mut self, preset: u8) -> Self {
        self.gpu_preset = preset;
        self
    }

    #[must_use]
    pub fn rate_control(mut self, rate_control: RateControl) -> Self {
        self.rate_control = Some(rate_control);
        self
    }

    #[must_use]
    pub fn quality(mut self, quality: QualityValue) -> Self {
        self.quality = Some(quality);
        self
    }

    #[must_use]
    pub fn audio(mut self, audio: AudioMode) -> Self {
        self.audio = audio;
        self
    }

    #[must_use]
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = jobs;
        self
    }

    /// Overrides the parallelism ceiling (defaults to the number of logical CPUs).
    #[must_use]
    pub fn max_parallel_jobs(mut self, max: usize) -> Self {
        self.max_parallel_jobs = Some(max);
        self
    }

    /// Validates the configuration and produces the settings.
    ///
    /// # Errors
    ///
    /// * `CoreError::UnsupportedEncoder` - the codec has no encoder of the requested kind
    /// * `CoreError::Config` - any other invalid combination or value
    pub fn build(self) -> CoreResult<JobSettings> {
        if self.codec.encoder(self.hardware).is_none() {
            return Err(CoreError::UnsupportedEncoder {
                codec: self.codec.to_string(),
                hardware: self.hardware,
            });
        }

        if !(1..=7).contains(&self.gpu_preset) {
            return Err(CoreError::Config(format!(
                "GPU preset must be between 1 and 7, got {}",
                self.gpu_preset
            )));
        }

        let rate_control = self
            .rate_control
            .unwrap_or_else(|| RateControl::default_for(self.hardware));
        if !rate_control.supported_by(self.hardware) {
            let kind = if self.hardware { "hardware" } else { "software" };
            return Err(CoreError::Config(format!(
                "{rate_control} is not available for {kind} encoders"
            )));
        }

        let quality = self
            .quality
            .unwrap_or_else(|| rate_control.default_quality());
        match (&quality, rate_control.is_quantizer()) {
            (QualityValue::Level(level), true) => {
                if *level > MAX_QUALITY_LEVEL {
                    return Err(CoreError::Config(format!(
                        "Quality level must be between 0 and {MAX_QUALITY_LEVEL}, got {level}"
                    )));
                }
            }
            (QualityValue::Bitrate(rate), false) => {
                if !is_valid_bitrate(rate) {
                    return Err(CoreError::Config(format!("Invalid bitrate '{rate}'")));
                }
            }
            (QualityValue::Bitrate(rate), true) => {
                return Err(CoreError::Config(format!(
                    "{rate_control} expects a quality level, got bitrate '{rate}'"
                )));
            }
            (QualityValue::Level(level), false) => {
                return Err(CoreError::Config(format!(
                    "{rate_control} expects a bitrate such as 10M, got '{level}'"
                )));
            }
        }

        if let AudioMode::Aac { bitrate_kbps: 0 } = self.audio {
            return Err(CoreError::Config("AAC bitrate must be positive".to_string()));
        }

        let suffix = self
            .suffix
            .unwrap_or_else(|| self.codec.default_suffix().to_string());
        if suffix.is_empty() {
            return Err(CoreError::Config("Output suffix must not be empty".to_string()));
        }
        if suffix.contains('/') || suffix.contains('\\') {
            return Err(CoreError::Config(format!(
                "Output suffix '{suffix}' must not contain path separators"
            )));
        }

        if self.parallel_jobs == 0 {
            return Err(CoreError::Config(
                "Parallel jobs must be at least 1".to_string(),
            ));
        }
        let max_jobs = self.max_parallel_jobs.unwrap_or_else(num_cpus::get).max(1);
        let parallel_jobs = if self.parallel_jobs > max_jobs {
            warn!(
                "Requested {} parallel jobs but only {} are available; using {}",
                self.parallel_jobs, max_jobs, max_jobs
            );
            max_jobs
        } else {
            self.parallel_jobs
        };

        Ok(JobSettings {
            codec: self.codec,
            hardware: self.hardware,
            resolution: self.resolution,
            gpu_preset: self.gpu_preset,
            rate_control,
            quality,
            audio: self.audio,
            container: self.container,
            suffix,
            parallel_jobs,
        })
    }
}
