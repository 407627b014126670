//! One input file and the encoder process that converts it.
//!
//! A job moves `Pending -> Running -> {Succeeded, Failed, Skipped, Cancelled}`
//! and its outcome is decided exactly once, by the worker running it. Other
//! threads can only ask it to stop. The stop flag and the process handle live
//! under the same lock, so a stop request either prevents the launch or
//! reaches the launched process; it is never lost in between.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::command::{build_encoder_args, format_command_line};
use crate::config::JobSettings;
use crate::error::CoreError;
use crate::events::{Event, EventHandler};
use crate::probe::MediaProber;
use crate::process::{EncoderProcess, EncoderSpawner, ProcessExit};
use crate::progress::{is_progress_marker, ProgressParser};

/// Sequence number assigned to a job at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Succeeded,
    Failed,
    /// The output already existed; nothing was launched.
    Skipped,
    /// Stopped on request. Not a failure.
    Cancelled,
}

impl JobOutcome {
    /// Succeeded and Skipped both count as success.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, JobOutcome::Succeeded | JobOutcome::Skipped)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed => "failed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Finished(JobOutcome),
}

struct JobControl<P> {
    state: JobState,
    stop_requested: bool,
    process: Option<P>,
    last_percent: Option<u8>,
}

/// Everything a job needs from its batch while it runs.
pub struct JobContext<'a, S: EncoderSpawner> {
    pub settings: &'a JobSettings,
    pub spawner: &'a S,
    pub prober: &'a dyn MediaProber,
    pub events: &'a dyn EventHandler,
}

pub struct Job<P> {
    id: JobId,
    input: PathBuf,
    output: PathBuf,
    control: Mutex<JobControl<P>>,
}

impl<P> Job<P> {
    pub fn new(id: JobId, input: PathBuf, output: PathBuf) -> Self {
        Self {
            id,
            input,
            output,
            control: Mutex::new(JobControl {
                state: JobState::Pending,
                stop_requested: false,
                process: None,
                last_percent: None,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// Last integer percentage reported for this job.
    pub fn last_percent(&self) -> Option<u8> {
        self.lock().last_percent
    }

    fn lock(&self) -> MutexGuard<'_, JobControl<P>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: EncoderProcess> Job<P> {
    /// Requests termination. Safe from any thread, idempotent, and a no-op
    /// once the job has finished. Never blocks on the process.
    pub fn stop(&self) {
        let mut control = self.lock();
        if matches!(control.state, JobState::Finished(_)) || control.stop_requested {
            return;
        }
        control.stop_requested = true;
        if let Some(process) = control.process.as_mut() {
            info!("Stopping encoder for {}", self.input.display());
            if !process.request_stop() {
                warn!(
                    "Graceful stop not delivered for {}, killing encoder",
                    self.input.display()
                );
                if let Err(e) = process.kill() {
                    error!("Failed to kill encoder for {}: {e}", self.input.display());
                }
            }
        }
    }

    /// Runs the job to completion on the calling thread and returns its
    /// outcome. A job runs at most once: calling again after it finished
    /// returns the recorded outcome, calling while it runs reports `Failed`
    /// without touching the running encoder.
    pub fn run<S>(&self, ctx: &JobContext<'_, S>) -> JobOutcome
    where
        S: EncoderSpawner<Process = P>,
    {
        {
            let control = self.lock();
            match control.state {
                JobState::Pending => {}
                JobState::Finished(outcome) => return outcome,
                JobState::Running => return JobOutcome::Failed,
            }
            if control.stop_requested {
                drop(control);
                return self.finish(ctx, JobOutcome::Cancelled);
            }
        }

        if self.output.exists() {
            info!("Skipping {}: output already exists", self.input.display());
            self.log(
                ctx,
                format!("Output {} already exists, skipping", self.output.display()),
            );
            return self.finish(ctx, JobOutcome::Skipped);
        }

        let duration = ctx.prober.duration_secs(&self.input);
        let parser = ProgressParser::new(duration);
        if !parser.is_enabled() {
            warn!("Unknown duration for {}", self.input.display());
            self.log(ctx, "Could not determine duration; progress will not be reported");
        }

        let args = match build_encoder_args(ctx.settings, &self.input, &self.output) {
            Ok(args) => args,
            Err(e) => {
                error!("Cannot build encoder command for {}: {e}", self.input.display());
                self.log(ctx, e.to_string());
                return self.finish(ctx, JobOutcome::Failed);
            }
        };

        let output_lines = {
            let mut control = self.lock();
            if control.stop_requested {
                drop(control);
                return self.finish(ctx, JobOutcome::Cancelled);
            }
            debug!("Running: {}", format_command_line(&ctx.spawner.program(), &args));
            match ctx.spawner.spawn(&args) {
                Ok(mut process) => {
                    let lines = process.take_output();
                    control.process = Some(process);
                    control.state = JobState::Running;
                    lines
                }
                Err(e) => {
                    drop(control);
                    error!("Failed to launch encoder for {}: {e}", self.input.display());
                    self.log(ctx, e.to_string());
                    return self.finish(ctx, JobOutcome::Failed);
                }
            }
        };

        info!(
            "Encoding {} -> {}",
            self.input.display(),
            self.output.display()
        );
        ctx.events.handle(&Event::JobStarted {
            job: self.input.clone(),
            output: self.output.clone(),
        });

        if let Some(lines) = output_lines {
            for line in lines {
                self.handle_line(ctx, &parser, &line);
            }
        }

        let (process, stop_requested) = {
            let mut control = self.lock();
            (control.process.take(), control.stop_requested)
        };
        let exit = match process {
            Some(mut process) => process.wait(),
            None => Err(CoreError::OperationFailed(
                "encoder process handle lost".to_string(),
            )),
        };

        let outcome = if stop_requested {
            self.remove_partial_output();
            self.log(ctx, "Stopped by request");
            JobOutcome::Cancelled
        } else {
            match exit {
                Ok(exit) if exit.success() => JobOutcome::Succeeded,
                Ok(ProcessExit::Exited(code)) => {
                    error!("Encoder for {} exited with code {code}", self.input.display());
                    self.log(ctx, format!("Encoder exited with code {code}"));
                    JobOutcome::Failed
                }
                Ok(ProcessExit::Signaled(signal)) => {
                    let detail = signal.map_or_else(
                        || "an unknown signal".to_string(),
                        |s| format!("signal {s}"),
                    );
                    error!("Encoder for {} was terminated by {detail}", self.input.display());
                    self.log(ctx, format!("Encoder terminated by {detail}"));
                    JobOutcome::Failed
                }
                Err(e) => {
                    error!("Encoder for {} failed: {e}", self.input.display());
                    self.log(ctx, e.to_string());
                    JobOutcome::Failed
                }
            }
        };

        self.finish(ctx, outcome)
    }

    fn handle_line<S: EncoderSpawner>(
        &self,
        ctx: &JobContext<'_, S>,
        parser: &ProgressParser,
        line: &str,
    ) {
        if is_progress_marker(line) {
            let Some(percent) = parser.parse_line(line) else {
                return;
            };
            let percent = percent.floor() as u8;
            let changed = {
                let mut control = self.lock();
                if control.last_percent == Some(percent) {
                    false
                } else {
                    control.last_percent = Some(percent);
                    true
                }
            };
            if changed {
                ctx.events.handle(&Event::Progress {
                    job: self.input.clone(),
                    percent,
                });
            }
        } else {
            self.log(ctx, line);
        }
    }

    fn log<S: EncoderSpawner>(&self, ctx: &JobContext<'_, S>, message: impl Into<String>) {
        ctx.events.handle(&Event::Log {
            job: Some(self.input.clone()),
            message: message.into(),
        });
    }

    fn remove_partial_output(&self) {
        if self.output.exists() {
            match fs::remove_file(&self.output) {
                Ok(()) => info!("Removed partial output {}", self.output.display()),
                Err(e) => warn!(
                    "Could not remove partial output {}: {e}",
                    self.output.display()
                ),
            }
        }
    }

    /// Records the terminal outcome (first call wins) and reports it.
    fn finish<S: EncoderSpawner>(&self, ctx: &JobContext<'_, S>, outcome: JobOutcome) -> JobOutcome {
        let outcome = {
            let mut control = self.lock();
            match control.state {
                JobState::Finished(recorded) => return recorded,
                _ => {
                    control.state = JobState::Finished(outcome);
                    control.process = None;
                    outcome
                }
            }
        };
        info!("{} {}", self.input.display(), outcome);
        ctx.events.handle(&Event::JobFinished {
            job: self.input.clone(),
            outcome,
            success: outcome.is_success(),
        });
        outcome
    }
}
