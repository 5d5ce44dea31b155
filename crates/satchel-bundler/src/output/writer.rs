//! All-or-nothing output writing.
//!
//! Every path is validated before a single byte is written. Files are then
//! written into a staging directory next to the output directory, and the
//! staging directory is swapped into place with two renames. Consumers see
//! either the previous build or the new one, never a mix.
//!
//! On any failure the staging directory is removed and the previous output
//! is left exactly as it was.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// A file of the finished build, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Replace the contents of `out_dir` with `files`.
pub fn write_output(files: &[OutputFile], out_dir: &Path) -> Result<()> {
    let out_dir = validate_and_normalize_dir(out_dir)?;
    let parent = out_dir
        .parent()
        .ok_or_else(|| Error::InvalidOutputPath(format!("'{}' has no parent", out_dir.display())))?
        .to_path_buf();
    let dir_name = out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidOutputPath(format!("'{}' has no name", out_dir.display())))?;

    let staging = parent.join(format!(".{}.staging-{}", dir_name, Uuid::new_v4()));

    // Phase 1: validate every path up front
    let operations = files
        .iter()
        .map(|file| Ok((validate_output_path(&staging, &file.path)?, file.bytes.as_slice())))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(&parent).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    // Phase 2: write into staging
    if let Err(err) = write_files(&staging, &operations) {
        cleanup_dir(&staging);
        return Err(err);
    }

    // Phase 3: swap staging into place
    if let Err(err) = swap_into_place(&staging, &out_dir, &parent, &dir_name) {
        cleanup_dir(&staging);
        return Err(err);
    }

    debug!(files = files.len(), "wrote {}", out_dir.display());
    Ok(())
}

fn write_files(staging: &Path, operations: &[(PathBuf, &[u8])]) -> Result<()> {
    fs::create_dir_all(staging).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create staging directory '{}': {}",
            staging.display(),
            e
        ))
    })?;

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(target_path, content).map_err(|e| {
            Error::WriteFailure(format!(
                "Failed to write '{}': {}",
                target_path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

fn swap_into_place(staging: &Path, out_dir: &Path, parent: &Path, dir_name: &str) -> Result<()> {
    let previous = if out_dir.exists() {
        let old = parent.join(format!(".{}.old-{}", dir_name, Uuid::new_v4()));
        fs::rename(out_dir, &old).map_err(|e| {
            Error::WriteFailure(format!(
                "Failed to move previous output '{}' aside: {}",
                out_dir.display(),
                e
            ))
        })?;
        Some(old)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, out_dir) {
        if let Some(old) = &previous {
            if let Err(restore) = fs::rename(old, out_dir) {
                warn!(
                    "Failed to restore previous output from '{}': {}",
                    old.display(),
                    restore
                );
            }
        }
        return Err(Error::WriteFailure(format!(
            "Failed to move '{}' to '{}': {}",
            staging.display(),
            out_dir.display(),
            e
        )));
    }

    if let Some(old) = previous {
        cleanup_dir(&old);
    }
    Ok(())
}

/// Best-effort removal; we are either done or already failing.
fn cleanup_dir(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!("Failed to clean up '{}': {}", dir.display(), e);
        }
    }
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    Ok(std::env::current_dir()
        .map_err(|e| Error::InvalidOutputPath(format!("Failed to get current directory: {}", e)))?
        .join(&cleaned)
        .clean())
}

/// Resolve `filename` under `base_dir`, rejecting anything that would land
/// outside of it.
pub fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(Error::InvalidOutputPath("Filename is empty".to_string()));
    }
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let filename_path = Path::new(filename).clean();
    if filename_path.is_absolute() {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' is absolute",
            filename
        )));
    }

    let full_path = base_dir.join(&filename_path).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}
