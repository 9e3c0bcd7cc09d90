// ABOUTME: Utility functions for the carousel pipeline
// ABOUTME: Path validation and atomic file writes used by the gallery and the CLI

use crate::errors::{PipelineError, Result};
use log::warn;
use std::fs;
use std::path::Path;

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::NotFound(format!("{:?}", path)));
    }
    if !path.is_file() {
        return Err(PipelineError::InvalidResource(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(PipelineError::InvalidResource(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_directory_exists(parent),
        _ => Ok(()),
    }
}

/// Write `contents` next to `path` under a temporary name, then rename it
/// over `path`. Readers never observe a half-written file.
pub fn write_file_atomic(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_directory_exists(path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "gallery".to_string());
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    fs::write(&temp_path, contents)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            warn!("Failed to clean up temp file {:?}: {}", temp_path, cleanup);
        }
        return Err(PipelineError::Io(e));
    }
    Ok(())
}
