//! Implementation of the 'encode' subcommand.
//!
//! Resolves the job settings from the preset and flags, finds and admits the
//! input files, then runs the batch on the core scheduler while rendering its
//! events. Ctrl-C stops the batch; a second Ctrl-C exits at once.

use crate::cli::EncodeArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::output::{self, BatchDisplay};

use vbconv_core::events::EventDispatcher;
use vbconv_core::logging::setup_logging;
use vbconv_core::{
    admit_by_codec, find_video_files, AudioMode, BatchSummary, ChannelEventHandler, Event,
    FfprobeProber, JobSettings, JobSettingsBuilder, JsonEventHandler, Preset, QualityValue,
    RateControl, Scheduler, SidecarSpawner, ToolPaths,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, LevelFilter};

/// How often the event loop checks for a stopped batch.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Builds the batch settings: preset values first, then individual flags.
pub fn build_settings(args: &EncodeArgs) -> CliResult<JobSettings> {
    let mut builder = args
        .preset
        .map_or_else(JobSettingsBuilder::new, Preset::builder);

    if let Some(codec) = args.codec {
        builder = builder.codec(codec);
    }

    let hardware = if args.cpu {
        Some(false)
    } else if args.gpu {
        Some(true)
    } else {
        None
    };
    if let Some(hardware) = hardware {
        builder = builder.hardware(hardware);
    }

    // A preset's rate control may not exist on the other kind of encoder.
    let mut rate_control = args.rate_control;
    if let (Some(preset), Some(hardware), None) = (args.preset, hardware, rate_control) {
        let base = preset.builder().build()?;
        if !base.rate_control.supported_by(hardware) {
            rate_control = Some(RateControl::default_for(hardware));
        }
    }

    if let Some(mode) = rate_control {
        builder = builder.rate_control(mode);
    }
    match (&args.quality, rate_control) {
        (Some(value), _) => builder = builder.quality(QualityValue::parse(value)?),
        (None, Some(mode)) => builder = builder.quality(mode.default_quality()),
        (None, None) => {}
    }

    if let Some(resolution) = args.resolution {
        builder = builder.resolution(resolution);
    }
    if let Some(preset) = args.gpu_preset {
        builder = builder.gpu_preset(preset);
    }
    if let Some(bitrate_kbps) = args.aac {
        builder = builder.audio(AudioMode::Aac { bitrate_kbps });
    } else if args.copy_audio {
        builder = builder.audio(AudioMode::Copy);
    }
    if let Some(container) = args.container {
        builder = builder.container(container);
    }
    if let Some(suffix) = &args.suffix {
        builder = builder.suffix(suffix.clone());
    }
    if let Some(jobs) = args.jobs {
        builder = builder.parallel_jobs(jobs);
    }

    builder.build()
}

/// `<dir>/logs` for the first input, or next to it when it is a file.
pub fn default_log_dir(first_input: &Path) -> PathBuf {
    let base = if first_input.is_dir() {
        first_input.to_path_buf()
    } else {
        first_input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    };
    base.join("logs")
}

/// Warning shown when probing left some candidates out of the batch.
fn rejection_warning(rejected: usize, source_codec: &str) -> Option<String> {
    match rejected {
        0 => None,
        1 => Some(format!("1 file is not {source_codec} video and will not be converted")),
        n => Some(format!("{n} files are not {source_codec} video and will not be converted")),
    }
}

fn describe_quality(settings: &JobSettings) -> String {
    format!("{} {}", settings.rate_control, settings.quality)
}

fn display_initialization_info(settings: &JobSettings, tools: &ToolPaths, log_file: &Path) {
    let encoder = settings.encoder().unwrap_or("none");
    let hardware = if settings.hardware { "GPU" } else { "CPU" };

    output::print_section("INITIALIZATION");
    if let Some(preset) = Preset::matching(settings) {
        output::print_status("Preset", preset.name());
    }
    output::print_status(
        "Encoder",
        &format!("{} ({encoder}, {hardware})", settings.codec),
    );
    output::print_status("Rate control", &describe_quality(settings));
    if settings.hardware {
        output::print_status("GPU preset", &format!("p{}", settings.gpu_preset));
    }
    output::print_status("Resolution", &settings.resolution.to_string());
    let audio = match settings.audio {
        AudioMode::Copy => "copy".to_string(),
        AudioMode::Aac { bitrate_kbps } => format!("AAC {bitrate_kbps}k"),
    };
    output::print_status("Audio", &audio);
    output::print_status(
        "Output",
        &format!("<name>{}.{}", settings.suffix, settings.container.extension()),
    );
    output::print_status("Parallel jobs", &settings.parallel_jobs.to_string());
    output::print_status("ffmpeg", &tools.ffmpeg.display().to_string());
    output::print_status("Log file", &log_file.display().to_string());
}

/// Runs the encode command and returns the batch summary.
pub fn run_encode(
    args: EncodeArgs,
    verbose: bool,
    log_level: LevelFilter,
) -> CliResult<BatchSummary> {
    let settings = build_settings(&args)?;

    let candidates = find_video_files(&args.inputs)?;

    let log_dir = match &args.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_dir(&args.inputs[0]),
    };
    let console_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let log_file = setup_logging(&log_dir, console_level, log_level)
        .cli_with_context(|| format!("Failed to set up logging in {}", log_dir.display()))?;
    info!("vbconv {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Run started: {}", chrono::Local::now());
    debug!("Settings: {settings:?}");

    let tools = ToolPaths::resolve(args.tools.ffmpeg.as_deref(), args.tools.ffprobe.as_deref())?;
    tools.check()?;

    if !args.json {
        display_initialization_info(&settings, &tools, &log_file);
    }

    let prober = Arc::new(FfprobeProber::new(&tools.ffprobe));
    let found = candidates.len();
    let admission = admit_by_codec(candidates, prober.as_ref(), &args.source_codec);
    for (path, codec) in &admission.rejected {
        debug!(
            "Not converting {}: video codec {}",
            path.display(),
            codec.as_deref().unwrap_or("unknown")
        );
    }
    if !args.json {
        output::print_status(
            "Files",
            &format!(
                "{} of {found} with {} video",
                admission.admitted.len(),
                args.source_codec
            ),
        );
        if let Some(warning) = rejection_warning(admission.rejected.len(), &args.source_codec) {
            output::print_warning(&warning);
        }
        println!();
    }

    let (channel, events) = ChannelEventHandler::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(Arc::new(channel));
    if args.json {
        dispatcher.add_handler(Arc::new(JsonEventHandler::new()));
    }

    let scheduler = Arc::new(Scheduler::new(
        SidecarSpawner::new(&tools.ffmpeg),
        prober,
        Arc::new(dispatcher),
    ));

    let stop_requested = Arc::new(AtomicBool::new(false));
    {
        let scheduler = Arc::clone(&scheduler);
        let stop_requested = Arc::clone(&stop_requested);
        ctrlc::set_handler(move || {
            if stop_requested.swap(true, Ordering::SeqCst) {
                // Second Ctrl-C - force exit
                std::process::exit(130);
            }
            scheduler.stop();
        })
        .map_err(|e| {
            vbconv_core::CoreError::OperationFailed(format!("Failed to set Ctrl-C handler: {e}"))
        })?;
    }

    let total = admission.admitted.len();
    scheduler.submit(admission.admitted, settings)?;

    let mut display = (!args.json).then(|| BatchDisplay::new(total, verbose));
    let mut stopping_shown = false;
    loop {
        match events.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => {
                let finished = matches!(event, Event::BatchFinished { .. });
                if let Some(display) = display.as_mut() {
                    display.handle(&event);
                }
                if finished {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop_requested.load(Ordering::SeqCst) && !stopping_shown {
                    if let Some(display) = display.as_ref() {
                        display.stopping();
                    }
                    stopping_shown = true;
                }
                if scheduler.is_idle() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    scheduler.wait_idle();
    // Workers emit before they exit, so anything left is already queued.
    while let Ok(event) = events.try_recv() {
        if let Some(display) = display.as_mut() {
            display.handle(&event);
        }
    }
    if let Some(display) = display {
        display.finish();
    }

    let summary = scheduler
        .summary()
        .cli_context("Batch ended without a summary")?;
    info!(
        "Batch finished: {} converted, {} skipped, {} failed, {} cancelled",
        summary.succeeded, summary.skipped, summary.failed, summary.cancelled
    );
    debug!("Finished at: {}", chrono::Local::now());
    if !args.json {
        output::print_summary(&summary);
    }
    Ok(summary)
}
