//! Path utilities

use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// Ensure a directory exists
pub fn ensure_dir(path: &Path) -> Result<(), BuildError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| BuildError::io("create directory", path, e))?;
    }
    Ok(())
}

/// Join lower-cased segments onto `base`
pub fn job_path(base: &Path, segments: &[&str]) -> PathBuf {
    segments
        .iter()
        .fold(base.to_path_buf(), |acc, seg| acc.join(seg.to_lowercase()))
}

/// Make `path` absolute against the current directory without touching the filesystem
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
