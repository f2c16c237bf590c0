//! Build command - runs the pipeline over a project directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use apkbuild::config::BuildConfig;
use apkbuild::pipeline::Pipeline;
use apkbuild::workspace::Workspace;

/// What to build and where the result goes.
pub struct BuildOptions {
    pub input: PathBuf,
    pub in_place: bool,
    pub output: Option<PathBuf>,
    pub remove_workspace: bool,
}

/// Execute the build command.
pub fn cmd_build(options: BuildOptions, config: &BuildConfig) -> Result<()> {
    let workspace = if options.in_place {
        Workspace::open(&options.input)
    } else {
        Workspace::copy_of(&options.input)
    }
    .with_context(|| format!("Failed to prepare workspace from {}", options.input.display()))?;

    let pipeline = Pipeline::new(&workspace, config);
    let apk = match pipeline.build() {
        Ok(apk) => apk,
        Err(e) => {
            if let Some(output) = e.output().filter(|o| !o.trim().is_empty()) {
                eprintln!("\n--- tool output ---\n{}\n-------------------", output.trim());
            }
            eprintln!("Workspace kept for inspection: {}", workspace.root().display());
            return Err(e.into());
        }
    };

    let digest = sha256_file(&apk)?;

    let delivered = match &options.output {
        Some(dest) => {
            copy_output(&apk, dest)?;
            dest.clone()
        }
        None => apk,
    };

    println!("\n=== Build Complete ===");
    println!("  Package: {}", delivered.display());
    println!("  SHA-256: {}", digest);

    if options.remove_workspace {
        let root = workspace.root().to_path_buf();
        workspace
            .remove()
            .with_context(|| format!("Failed to remove workspace {}", root.display()))?;
        println!("  Removed workspace {}", root.display());
    }
    Ok(())
}

fn copy_output(apk: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(apk, dest)
        .with_context(|| format!("Failed to copy {} to {}", apk.display(), dest.display()))?;
    Ok(())
}

/// Hex SHA-256 of a file, streamed.
fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}
