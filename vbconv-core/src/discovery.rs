//! Discovery of candidate video files and the codec admission filter.
//!
//! Directories are walked recursively and filtered by extension; files named
//! explicitly are always candidates. Admission then probes every candidate's
//! video codec in parallel and keeps the ones matching the source codec.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};
use crate::probe::MediaProber;

/// Extensions considered video files when walking directories (lowercase).
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "flv", "wmv"];

/// Checks the extension against [`VIDEO_EXTENSIONS`], case-insensitively.
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

/// Collects candidate files from a mix of files and directories.
///
/// Directories are searched recursively for video files; explicit files are
/// taken as they are. The result keeps discovery order without duplicates.
///
/// # Errors
///
/// * `CoreError::PathError` - a path does not exist
/// * `CoreError::Walkdir` - a directory given by the caller cannot be read
/// * `CoreError::NoFilesFound` - nothing matched
pub fn find_video_files(paths: &[PathBuf]) -> CoreResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            if seen.insert(root.clone()) {
                files.push(root.clone());
            }
            continue;
        }
        if !root.is_dir() {
            return Err(CoreError::PathError(format!(
                "{} does not exist",
                root.display()
            )));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };
            if entry.file_type().is_file() && is_video_file(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        debug!("Found {} video file(s) under {}", found.len(), root.display());

        for path in found {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        let root = paths.first().cloned().unwrap_or_default();
        return Err(CoreError::NoFilesFound(root));
    }
    Ok(files)
}

/// Result of the admission filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    /// Files whose video codec matched, in candidate order.
    pub admitted: Vec<PathBuf>,
    /// Files left out, with the codec found (`None` if it could not be determined).
    pub rejected: Vec<(PathBuf, Option<String>)>,
}

/// Probes `candidates` in parallel and admits those whose first video stream
/// uses `source_codec` (compared case-insensitively).
pub fn admit_by_codec(
    candidates: Vec<PathBuf>,
    prober: &dyn MediaProber,
    source_codec: &str,
) -> Admission {
    let probed: Vec<(PathBuf, Option<String>)> = candidates
        .into_par_iter()
        .map(|path| {
            let codec = prober.video_codec(&path);
            (path, codec)
        })
        .collect();

    let mut admission = Admission::default();
    for (path, codec) in probed {
        match codec {
            Some(ref name) if name.eq_ignore_ascii_case(source_codec) => {
                admission.admitted.push(path);
            }
            other => {
                debug!(
                    "Not admitting {} (codec {})",
                    path.display(),
                    other.as_deref().unwrap_or("unknown")
                );
                admission.rejected.push((path, other));
            }
        }
    }
    info!(
        "Admitted {} of {} file(s) with {source_codec} video",
        admission.admitted.len(),
        admission.admitted.len() + admission.rejected.len()
    );
    admission
}
