//! Small filesystem helpers shared by every pipeline step.
//!
//! Artifact existence doubles as the completion marker of a step, so every
//! artifact the pipeline writes itself goes through [`write_atomic`].

use crate::error::{MenevalError, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Writes `bytes` to a temporary file next to `path` and renames it in place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = parent_or_current(path);
    fs::create_dir_all(&parent)?;
    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| MenevalError::Io(e.error))?;
    Ok(())
}

/// Barrier after every external step: the declared output must exist.
pub fn check_file_creation(path: &Path) -> Result<()> {
    if path.exists() {
        tracing::info!("{} created", path.display());
        Ok(())
    } else {
        tracing::error!("/!\\ {} not created !", path.display());
        Err(MenevalError::ArtifactNotProduced(path.to_path_buf()))
    }
}

/// Returns the single file of `dir` ending with `ext`. Zero or several
/// matches are logged and yield `None`.
pub fn unique_file_with_ext(dir: &Path, ext: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list directory {}: {e}", dir.display());
            return None;
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ext))
        })
        .collect();
    match files.len() {
        0 => {
            tracing::warn!("No file with the extension {ext} in path {}", dir.display());
            None
        }
        1 => files.pop(),
        _ => {
            tracing::warn!(
                "More than 1 file with the extension {ext} in path {}",
                dir.display()
            );
            None
        }
    }
}

/// Creates `dir` if needed; returns whether it was created.
pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        tracing::info!("{} already exists", dir.display());
        Ok(false)
    } else {
        fs::create_dir_all(dir)?;
        tracing::info!("{} created", dir.display());
        Ok(true)
    }
}
