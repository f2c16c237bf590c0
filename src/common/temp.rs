//! Utilities for managing temporary work directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Random lowercase hex string of `len` characters.
pub fn random_hex(len: usize) -> String {
    let mut out = String::with_capacity(len + 16);
    while out.len() < len {
        out.push_str(&format!("{:016x}", rand::random::<u64>()));
    }
    out.truncate(len);
    out
}

/// Prepare a uniquely named work directory under `parent_dir`.
///
/// The name is `<prefix>-<16 hex>`. If a directory of that name already
/// exists it is removed before being created fresh.
///
/// # Returns
/// Path to the newly created, empty work directory
pub fn prepare_work_dir(parent_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let work_dir = parent_dir.join(format!("{}-{}", prefix, random_hex(16)));

    // Clean up if it exists from a previous run
    if work_dir.exists() {
        fs::remove_dir_all(&work_dir).map_err(|e| {
            Error::resource(&work_dir, format!("cannot remove existing directory: {}", e))
        })?;
    }

    fs::create_dir_all(&work_dir)
        .map_err(|e| Error::resource(&work_dir, format!("cannot create directory: {}", e)))?;

    tracing::info!("Created working directory {}", work_dir.display());
    Ok(work_dir)
}

/// Clean up a work directory after use.
///
/// A directory that is already gone is not an error.
pub fn cleanup_work_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!("Removed working directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            Err(Error::resource(path, format!("cannot remove directory: {}", e)))
        }
    }
}
