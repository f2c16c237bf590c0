//! In-place patching of zip containers.
//!
//! [`patch`] replaces or appends entries in an existing package. Surviving
//! entries are copied raw (compressed bytes verbatim), so nothing but the
//! injected files is recompressed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::common::random_hex;
use crate::error::{Error, Result};

/// Inject `files` into the container at `container`.
///
/// Every existing entry whose name equals the base name of an injected file
/// is dropped; every other entry is kept in its original order. Injected
/// files follow, in the order given, as deflated entries named by base name.
///
/// The container is rewritten through a temporary sibling. If this fails
/// after the rename, the temporary file is left behind and the container is
/// incomplete. Not safe for concurrent use on the same path.
pub fn patch(container: &Path, files: &[PathBuf]) -> Result<()> {
    let names = injected_names(files)?;
    let replaced: HashSet<&str> = names.iter().map(String::as_str).collect();

    let temp = temp_sibling(container)?;
    fs::rename(container, &temp).map_err(|e| Error::io(container, e))?;
    tracing::debug!(
        "Patching {} ({} file(s)) via {}",
        container.display(),
        files.len(),
        temp.display()
    );

    let original = File::open(&temp).map_err(|e| Error::io(&temp, e))?;
    let mut source =
        ZipArchive::new(BufReader::new(original)).map_err(|e| Error::archive(&temp, e))?;

    let output = File::create(container).map_err(|e| Error::io(container, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(output));

    let mut kept = 0usize;
    for index in 0..source.len() {
        let entry = source
            .by_index_raw(index)
            .map_err(|e| Error::archive(&temp, e))?;
        if replaced.contains(entry.name()) {
            tracing::debug!("Replacing entry {}", entry.name());
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|e| Error::archive(container, e))?;
        kept += 1;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (file, name) in files.iter().zip(&names) {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::archive(container, e))?;
        let mut input = File::open(file).map_err(|e| Error::io(file, e))?;
        io::copy(&mut input, &mut writer).map_err(|e| Error::io(file, e))?;
    }

    writer.finish().map_err(|e| Error::archive(container, e))?;
    drop(source);
    fs::remove_file(&temp).map_err(|e| Error::io(&temp, e))?;

    tracing::debug!(
        "Patched {}: kept {} entr(ies), injected {}",
        container.display(),
        kept,
        files.len()
    );
    Ok(())
}

/// Names of every entry in `container`, in central directory order.
pub fn entry_names(container: &Path) -> Result<Vec<String>> {
    let file = File::open(container).map_err(|e| Error::io(container, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive(container, e))?;
    (0..archive.len())
        .map(|index| {
            archive
                .by_index_raw(index)
                .map(|entry| entry.name().to_string())
                .map_err(|e| Error::archive(container, e))
        })
        .collect()
}

/// Whether `container` holds an entry called `name`.
pub fn contains_entry(container: &Path, name: &str) -> Result<bool> {
    let file = File::open(container).map_err(|e| Error::io(container, e))?;
    let archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive(container, e))?;
    Ok(archive.index_for_name(name).is_some())
}

fn base_name(file: &Path) -> Result<String> {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::resource(file, "injected path has no file name"))
}

/// Base names of `files` in order, rejecting duplicates before anything is touched.
fn injected_names(files: &[PathBuf]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(files.len());
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        let name = base_name(file)?;
        if !seen.insert(name.clone()) {
            return Err(Error::resource(
                file,
                format!("another injected file is also named '{}'", name),
            ));
        }
        names.push(name);
    }
    Ok(names)
}

fn temp_sibling(container: &Path) -> Result<PathBuf> {
    let name = container
        .file_name()
        .ok_or_else(|| Error::resource(container, "container path has no file name"))?;
    Ok(container.with_file_name(format!(
        ".{}.{}.patch",
        name.to_string_lossy(),
        random_hex(8)
    )))
}
