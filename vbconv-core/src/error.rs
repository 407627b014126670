//! Error types and result aliases for vbconv-core.
//!
//! Everything the engine can fail with funnels into [`CoreError`]. Job-level
//! failures never escape as errors: a job turns them into a `Failed` outcome
//! and its siblings keep running. The variants here are what callers see when
//! a whole operation (settings validation, submission, discovery, `info`)
//! cannot proceed.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors produced by the vbconv core library.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Directory traversal error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No encoder for {codec} with hardware={hardware}")]
    UnsupportedEncoder { codec: String, hardware: bool },

    #[error("Failed to start command '{0}': {1}")]
    CommandStart(String, io::Error),

    #[error("Failed to wait for command '{0}': {1}")]
    CommandWait(String, io::Error),

    #[error("Command '{0}' failed with status {1}. Stderr: {2}")]
    CommandFailed(String, ExitStatus, String),

    #[error("Required dependency '{0}' not found or failed to execute")]
    DependencyNotFound(String),

    #[error("ffprobe output parse error: {0}")]
    FfprobeParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("A batch is already running; stop it or wait for it to finish")]
    BatchInProgress,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("No video files found in {}", .0.display())]
    NoFilesFound(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for vbconv-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Builds a [`CoreError::CommandStart`] for the named program.
pub fn command_start_error(cmd_name: impl Into<String>, error: io::Error) -> CoreError {
    CoreError::CommandStart(cmd_name.into(), error)
}

/// Builds a [`CoreError::CommandWait`] for the named program.
pub fn command_wait_error(cmd_name: impl Into<String>, error: io::Error) -> CoreError {
    CoreError::CommandWait(cmd_name.into(), error)
}

/// Builds a [`CoreError::CommandFailed`] for the named program.
pub fn command_failed_error(
    cmd_name: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed(cmd_name.into(), status, stderr.into())
}
