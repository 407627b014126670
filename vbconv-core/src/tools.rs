//! Locating and checking the external ffmpeg/ffprobe binaries.
//!
//! Resolution order for each tool:
//! 1. an explicit path from the caller (CLI flag or environment variable),
//! 2. a bundled copy in `assets/ffmpeg/` next to the running executable,
//! 3. the first match on `PATH`.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::error::{command_start_error, CoreError, CoreResult};

/// Directory (relative to the executable) holding bundled binaries.
pub const BUNDLED_TOOLS_DIR: &str = "assets/ffmpeg";

/// Resolved locations of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    /// Resolves both tools, preferring the explicit overrides.
    ///
    /// # Errors
    ///
    /// `CoreError::DependencyNotFound` for the first tool that cannot be located.
    pub fn resolve(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> CoreResult<Self> {
        Ok(Self {
            ffmpeg: locate_tool("ffmpeg", ffmpeg)?,
            ffprobe: locate_tool("ffprobe", ffprobe)?,
        })
    }

    /// Runs `-version` on both tools.
    pub fn check(&self) -> CoreResult<()> {
        check_dependency(&self.ffmpeg)?;
        check_dependency(&self.ffprobe)?;
        Ok(())
    }
}

fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    }
}

fn bundled_tool(tool: &str) -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let candidate = exe
        .parent()?
        .join(BUNDLED_TOOLS_DIR)
        .join(executable_name(tool));
    candidate.is_file().then_some(candidate)
}

/// Finds `tool`, trying `explicit`, the bundled directory and `PATH` in turn.
pub fn locate_tool(tool: &str, explicit: Option<&Path>) -> CoreResult<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            debug!("Using {tool} from {}", path.display());
            return Ok(path.to_path_buf());
        }
        // A bare name such as "ffmpeg7" is looked up on PATH.
        if let Ok(found) = which::which(path) {
            debug!("Using {tool} from {}", found.display());
            return Ok(found);
        }
        warn!(
            "Configured {tool} path {} not found, searching elsewhere",
            path.display()
        );
    }

    if let Some(path) = bundled_tool(tool) {
        debug!("Using bundled {tool} at {}", path.display());
        return Ok(path);
    }

    which::which(tool).map_err(|e| {
        warn!("Dependency '{tool}' not found: {e}");
        CoreError::DependencyNotFound(tool.to_string())
    })
}

/// Checks that `program -version` can be executed.
pub fn check_dependency(program: &Path) -> CoreResult<()> {
    let name = program.to_string_lossy().into_owned();
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => {
            debug!("Found dependency: {name}");
            Ok(())
        }
        Ok(status) => {
            warn!("Dependency '{name}' exited with {status}");
            Err(CoreError::DependencyNotFound(name))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Dependency '{name}' not found.");
            Err(CoreError::DependencyNotFound(name))
        }
        Err(e) => Err(command_start_error(name, e)),
    }
}
