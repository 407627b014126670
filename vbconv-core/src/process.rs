//! Encoder process abstraction.
//!
//! Jobs never touch `std::process` directly. They go through
//! [`EncoderSpawner`] and [`EncoderProcess`], which the real engine backs with
//! ffmpeg-sidecar and tests back with scripted fakes.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use log::{debug, warn};

use crate::error::{command_start_error, command_wait_error, CoreError, CoreResult};

/// How an encoder process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Normal exit with a status code.
    Exited(i32),
    /// Terminated by a signal (number when the platform reports one).
    Signaled(Option<i32>),
}

impl ProcessExit {
    #[must_use]
    pub fn success(self) -> bool {
        self == ProcessExit::Exited(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ProcessExit::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ProcessExit::Signaled(status.signal())
        }
        #[cfg(not(unix))]
        {
            ProcessExit::Signaled(None)
        }
    }
}

/// A running encoder owned by exactly one job.
pub trait EncoderProcess: Send {
    /// Merged stdout/stderr lines. The channel closes once both streams end.
    /// Returns `None` after the first call.
    fn take_output(&mut self) -> Option<Receiver<String>>;

    /// Asks the encoder to finish early. Returns `false` when the request
    /// could not be delivered.
    fn request_stop(&mut self) -> bool;

    /// Forcefully terminates the process.
    fn kill(&mut self) -> CoreResult<()>;

    /// Reaps the process.
    fn wait(&mut self) -> CoreResult<ProcessExit>;
}

/// Launches encoder processes.
pub trait EncoderSpawner: Send + Sync {
    type Process: EncoderProcess + 'static;

    /// Program name used in log messages.
    fn program(&self) -> String;

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process>;
}

// ============================================================================
// FFMPEG-SIDECAR IMPLEMENTATION
// ============================================================================

/// Spawns ffmpeg through ffmpeg-sidecar, which pipes all three standard
/// streams and hides the console window on Windows.
#[derive(Debug, Clone)]
pub struct SidecarSpawner {
    ffmpeg_path: PathBuf,
}

impl SidecarSpawner {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    #[must_use]
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

impl Default for SidecarSpawner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl EncoderSpawner for SidecarSpawner {
    type Process = SidecarProcess;

    fn program(&self) -> String {
        self.ffmpeg_path.to_string_lossy().into_owned()
    }

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process> {
        let mut command = FfmpegCommand::new_with_path(&self.ffmpeg_path);
        command.args(args);
        let mut child = command
            .spawn()
            .map_err(|e| command_start_error(self.program(), e))?;

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.take_stdout() {
            spawn_line_pump(stdout, sender.clone());
        }
        if let Some(stderr) = child.take_stderr() {
            spawn_line_pump(stderr, sender);
        }

        Ok(SidecarProcess {
            child,
            output: Some(receiver),
        })
    }
}

pub struct SidecarProcess {
    child: FfmpegChild,
    output: Option<Receiver<String>>,
}

impl EncoderProcess for SidecarProcess {
    fn take_output(&mut self) -> Option<Receiver<String>> {
        self.output.take()
    }

    fn request_stop(&mut self) -> bool {
        match self.child.quit() {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not send quit to ffmpeg: {e}");
                false
            }
        }
    }

    fn kill(&mut self) -> CoreResult<()> {
        self.child
            .kill()
            .map_err(|e| CoreError::OperationFailed(format!("Failed to kill ffmpeg: {e}")))
    }

    fn wait(&mut self) -> CoreResult<ProcessExit> {
        self.child
            .wait()
            .map(ProcessExit::from)
            .map_err(|e| command_wait_error("ffmpeg", e))
    }
}

/// Reads `reader` line by line (lossy UTF-8) into `sender` on its own thread.
fn spawn_line_pump<R: Read + Send + 'static>(reader: R, sender: Sender<String>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Encoder output stream closed: {e}");
                    break;
                }
            }
        }
    });
}
