//! Per-build working directory.
//!
//! Every stage reads and writes fixed paths inside one workspace:
//!
//! ```text
//! <workspace>/
//! ├── AndroidManifest.xml
//! ├── res/                       resource tree
//! ├── java/                      application sources
//! ├── class/                     pre-compiled classes
//! ├── asset/                     raw assets
//! └── target/
//!     ├── generated-sources/     R.java from aapt
//!     ├── generated-classes/     javac output
//!     ├── classes.dex            dx output
//!     ├── <name>.apk.unaligned   packaged, then signed in place
//!     └── <name>.apk             final aligned package
//! ```
//!
//! A workspace is created for one build and never reused. Removing it is the
//! caller's decision; failed builds keep everything for inspection.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::common::{cleanup_work_dir, copy_dir_all, prepare_work_dir, write_file_with_dirs};
use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "AndroidManifest.xml";
pub const RES_DIR: &str = "res";
pub const JAVA_DIR: &str = "java";
pub const CLASS_DIR: &str = "class";
pub const ASSET_DIR: &str = "asset";
pub const TARGET_DIR: &str = "target";
pub const GENERATED_SOURCES_DIR: &str = "target/generated-sources";
pub const GENERATED_CLASSES_DIR: &str = "target/generated-classes";
pub const DEX_FILE: &str = "target/classes.dex";

/// Directories every workspace must have before the pipeline runs.
pub const LAYOUT_DIRS: [&str; 7] = [
    TARGET_DIR,
    GENERATED_CLASSES_DIR,
    GENERATED_SOURCES_DIR,
    JAVA_DIR,
    CLASS_DIR,
    RES_DIR,
    ASSET_DIR,
];

const WORK_DIR_PREFIX: &str = "apkbuild";

/// One entry of an in-memory input tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// An empty directory, relative to the workspace root.
    Directory(PathBuf),
    /// A file with its full contents, relative to the workspace root.
    File { path: PathBuf, contents: Vec<u8> },
}

impl Entry {
    pub fn file(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self::File {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::File { path, .. } => path,
        }
    }
}

/// Where the inputs of a workspace come from.
#[derive(Debug, Clone)]
pub enum Seed {
    /// Copy an existing directory tree verbatim.
    Directory(PathBuf),
    /// Write the given entries.
    Entries(Vec<Entry>),
}

/// A prepared working directory with the fixed pipeline layout.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Allocate a fresh, empty workspace under the system temp directory.
    pub fn prepare() -> Result<Self> {
        Self::prepare_in(&std::env::temp_dir())
    }

    /// Allocate a fresh, empty workspace under `parent`.
    pub fn prepare_in(parent: &Path) -> Result<Self> {
        let parent = std::path::absolute(parent).map_err(|e| Error::io(parent, e))?;
        let root = prepare_work_dir(&parent, WORK_DIR_PREFIX)?;
        Ok(Self { root })
    }

    /// Allocate a fresh workspace, seed it and lay out the sub-directories.
    ///
    /// `overwrite` is passed to [`materialize_into`]. Partial failures are not
    /// rolled back: the workspace may be left half populated.
    pub fn materialize(seed: Seed, overwrite: bool) -> Result<Self> {
        Self::materialize_in(&std::env::temp_dir(), seed, overwrite)
    }

    /// Like [`Workspace::materialize`], allocating under `parent`.
    pub fn materialize_in(parent: &Path, seed: Seed, overwrite: bool) -> Result<Self> {
        let workspace = Self::prepare_in(parent)?;
        materialize_into(&workspace.root, &seed, overwrite)?;
        workspace.layout()?;
        Ok(workspace)
    }

    /// Fresh workspace seeded from a copy of `dir`; `dir` is left untouched.
    pub fn copy_of(dir: &Path) -> Result<Self> {
        Self::materialize(Seed::Directory(dir.to_path_buf()), false)
    }

    /// Use `dir` itself as the workspace. The caller declares it safe to edit.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::resource(dir, "not a directory"));
        }
        let root = std::path::absolute(dir).map_err(|e| Error::io(dir, e))?;
        let workspace = Self { root };
        workspace.layout()?;
        Ok(workspace)
    }

    /// Create the fixed sub-directories. See [`layout_subdirectories`].
    pub fn layout(&self) -> Result<()> {
        layout_subdirectories(&self.root)
    }

    /// Delete the whole workspace. A workspace that is already gone is fine.
    pub fn remove(self) -> Result<()> {
        cleanup_work_dir(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn res_dir(&self) -> PathBuf {
        self.root.join(RES_DIR)
    }

    pub fn java_dir(&self) -> PathBuf {
        self.root.join(JAVA_DIR)
    }

    pub fn class_dir(&self) -> PathBuf {
        self.root.join(CLASS_DIR)
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.root.join(ASSET_DIR)
    }

    pub fn target_dir(&self) -> PathBuf {
        self.root.join(TARGET_DIR)
    }

    pub fn generated_sources_dir(&self) -> PathBuf {
        self.root.join(GENERATED_SOURCES_DIR)
    }

    pub fn generated_classes_dir(&self) -> PathBuf {
        self.root.join(GENERATED_CLASSES_DIR)
    }

    pub fn dex_file(&self) -> PathBuf {
        self.root.join(DEX_FILE)
    }

    /// `target/<name>.apk.unaligned`
    pub fn unaligned_apk(&self, name: &str) -> PathBuf {
        self.target_dir().join(format!("{}.apk.unaligned", name))
    }

    /// `target/<name>.apk`
    pub fn final_apk(&self, name: &str) -> PathBuf {
        self.target_dir().join(format!("{}.apk", name))
    }
}

/// Idempotently create the fixed sub-directory set under `root`.
///
/// Existing directories and files are left alone.
pub fn layout_subdirectories(root: &Path) -> Result<()> {
    for dir in LAYOUT_DIRS {
        let path = root.join(dir);
        if path.exists() && !path.is_dir() {
            return Err(Error::resource(&path, "exists but is not a directory"));
        }
        fs::create_dir_all(&path)
            .map_err(|e| Error::resource(&path, format!("cannot create directory: {}", e)))?;
    }
    Ok(())
}

/// Write `seed` into `dest`.
///
/// Fails with [`Error::Resource`] if `dest` already has content and
/// `overwrite` is false.
pub fn materialize_into(dest: &Path, seed: &Seed, overwrite: bool) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let non_empty = fs::read_dir(dest)
        .map_err(|e| Error::io(dest, e))?
        .next()
        .is_some();
    if non_empty && !overwrite {
        return Err(Error::resource(
            dest,
            "destination is not empty and overwrite was not requested",
        ));
    }

    match seed {
        Seed::Directory(source) => {
            if !source.is_dir() {
                return Err(Error::resource(source, "source directory does not exist"));
            }
            let copied = copy_dir_all(source, dest)?;
            tracing::debug!("Copied {} files from {}", copied, source.display());
        }
        Seed::Entries(entries) => {
            for entry in entries {
                let relative = checked_relative(entry.path())?;
                let path = dest.join(relative);
                match entry {
                    Entry::Directory(_) => {
                        fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                    }
                    Entry::File { contents, .. } => write_file_with_dirs(&path, contents)?,
                }
            }
            tracing::debug!("Wrote {} entries into {}", entries.len(), dest.display());
        }
    }
    Ok(())
}

// Entry names come from an archive; they must stay inside the workspace.
fn checked_relative(path: &Path) -> Result<&Path> {
    let trimmed = path.strip_prefix("/").unwrap_or(path);
    for component in trimmed.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(Error::resource(path, "entry path escapes the workspace")),
        }
    }
    Ok(trimmed)
}

/// Every `*.java` file under `root`, depth-first and sorted by file name.
///
/// The walk is lazy. A missing `root` yields a single error item.
pub fn java_sources(root: &Path) -> impl Iterator<Item = Result<PathBuf>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let is_java = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "java");
                is_java.then(|| Ok(entry.into_path()))
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                Some(Err(Error::io(path, source)))
            }
        })
}

/// True if `dir` contains at least one regular file, at any depth.
pub fn has_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file())
}
