//! Local file source
//!
//! Writes containers as pretty-printed JSON files and reads them back, either
//! from disk or from raw dropped bytes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};

use super::container::{parse_container, BackupContainer};

/// Write a container into `dir` under its conventional file name
///
/// Returns the path of the written file.
pub fn write_backup_file(
    dir: &Path,
    container: &BackupContainer,
    product: &str,
) -> BackupResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| BackupError::Io(format!("Failed to create backup directory: {}", e)))?;

    let path = dir.join(container.file_name(product));
    let json = container.to_pretty_json()?;

    fs::write(&path, json)
        .map_err(|e| BackupError::Io(format!("Failed to write backup file: {}", e)))?;

    tracing::info!(path = %path.display(), encrypted = container.is_encrypted(), "wrote backup file");
    Ok(path)
}

/// Read and validate a backup file
pub fn read_backup_file(path: &Path) -> BackupResult<BackupContainer> {
    let bytes = fs::read(path)
        .map_err(|e| BackupError::Io(format!("Failed to read backup file: {}", e)))?;
    parse_backup_bytes(&bytes)
}

/// Validate a backup from raw bytes, e.g. a dropped file
pub fn parse_backup_bytes(bytes: &[u8]) -> BackupResult<BackupContainer> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| BackupError::InvalidFormat("backup is not UTF-8 text".into()))?;
    parse_container(text)
}
