//! Core library for batch video conversion with ffmpeg.
//!
//! This crate discovers video files, admits the ones whose video stream uses
//! a given source codec, and converts them with a bounded pool of concurrent
//! ffmpeg processes. Progress and outcomes are reported through an
//! [`EventHandler`], and a running batch can be stopped at any time.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use vbconv_core::{
//!     admit_by_codec, find_video_files, ChannelEventHandler, Event, FfprobeProber,
//!     JobSettingsBuilder, Scheduler, SidecarSpawner, VideoCodec,
//! };
//!
//! let prober = Arc::new(FfprobeProber::new("ffprobe"));
//! let candidates = find_video_files(&[PathBuf::from("/path/to/videos")]).unwrap();
//! let admission = admit_by_codec(candidates, prober.as_ref(), "h264");
//!
//! let settings = JobSettingsBuilder::new()
//!     .codec(VideoCodec::Hevc)
//!     .hardware(false)
//!     .build()
//!     .unwrap();
//!
//! let (handler, events) = ChannelEventHandler::new();
//! let scheduler = Scheduler::new(SidecarSpawner::new("ffmpeg"), prober, Arc::new(handler));
//! scheduler.submit(admission.admitted, settings).unwrap();
//!
//! for event in events.iter() {
//!     if let Event::BatchFinished { summary } = event {
//!         println!("{} converted", summary.succeeded);
//!         break;
//!     }
//! }
//! scheduler.wait_idle();
//! ```

pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod job;
pub mod logging;
pub mod probe;
pub mod process;
pub mod progress;
pub mod scheduler;
pub mod tools;
pub mod utils;

// Re-exports for public API
pub use command::build_encoder_args;
pub use config::{
    AudioMode, Container, JobSettings, JobSettingsBuilder, Preset, QualityValue, RateControl,
    Resolution, VideoCodec,
};
pub use discovery::{admit_by_codec, find_video_files, Admission};
pub use error::{CoreError, CoreResult};
pub use events::{ChannelEventHandler, Event, EventHandler, JsonEventHandler};
pub use job::{JobId, JobOutcome};
pub use probe::{FfprobeProber, MediaInfo, MediaProber};
pub use process::{EncoderProcess, EncoderSpawner, ProcessExit, SidecarSpawner};
pub use progress::ProgressParser;
pub use scheduler::{BatchId, BatchProgress, BatchSummary, Scheduler};
pub use tools::ToolPaths;
pub use utils::{format_bytes, format_duration};
