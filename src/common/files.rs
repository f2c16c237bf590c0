//! Utilities for file operations with automatic parent directory creation.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Write a file, creating parent directories as needed.
///
/// This is a convenience function that combines creating the parent directory
/// with writing the file content, eliminating the common pattern of:
/// ```ignore
/// if let Some(parent) = path.parent() {
///     fs::create_dir_all(parent)?;
/// }
/// fs::write(path, content)?;
/// ```
pub fn write_file_with_dirs<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Copy every directory and regular file under `source` into `destination`.
///
/// Symlinks are not followed. Existing files at the destination are
/// overwritten; nothing is deleted.
pub fn copy_dir_all(source: &Path, destination: &Path) -> Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            Error::io(path, source)
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| Error::resource(entry.path(), "escapes the copy source"))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| Error::io(entry.path(), e))?;
            copied += 1;
        } else {
            tracing::debug!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_with_dirs_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c.txt");

        write_file_with_dirs(&path, "hi").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hi");
    }

    #[test]
    fn test_copy_dir_all_preserves_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write_file_with_dirs(src.join("res/layout/main.xml"), "<x/>").unwrap();
        write_file_with_dirs(src.join("AndroidManifest.xml"), "<manifest/>").unwrap();
        fs::create_dir_all(src.join("asset")).unwrap();

        let dst = temp.path().join("dst");
        let copied = copy_dir_all(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("res/layout/main.xml")).unwrap(),
            "<x/>"
        );
        assert!(dst.join("asset").is_dir());
    }
}
