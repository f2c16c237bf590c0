//! Shared test utilities for apkbuild tests.
//!
//! The SDK and JDK tools are replaced by small shell scripts that log their
//! arguments and produce just enough output for the next stage.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use apkbuild::config::{BuildConfig, BuildConfigBuilder, Environment};
use apkbuild::sdk::Tool;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const OUTPUT_NAME: &str = "demo";

/// Test environment with a project, a tool directory and a call log.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Root of the temporary tree
    pub base: PathBuf,
    /// Project inputs, copied into each workspace
    pub project: PathBuf,
    /// Stub tools
    pub bin: PathBuf,
    /// Every stub appends one line here per invocation
    pub log: PathBuf,
    /// Zip returned by the packaging stub
    pub fixture_apk: PathBuf,
    /// Zip the signing stub writes over the package
    pub signed_fixture_apk: PathBuf,
    /// Parent directory for workspaces
    pub work: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path().to_path_buf();

        let project = base.join("project");
        let bin = base.join("bin");
        let work = base.join("work");
        for dir in [&project, &bin, &work] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        let fixture_apk = base.join("fixture.apk");
        create_fixture_apk(&fixture_apk);
        let signed_fixture_apk = base.join("fixture-signed.apk");
        create_signed_fixture_apk(&signed_fixture_apk);

        Self {
            _temp_dir: temp_dir,
            log: base.join("calls.log"),
            base,
            project,
            bin,
            fixture_apk,
            signed_fixture_apk,
            work,
        }
    }

    /// Write an executable shell script to `bin/<name>` and return its path.
    pub fn write_stub(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin.join(name);
        let script = format!(
            "#!/bin/sh\necho \"{} $*\" >> '{}'\n{}\n",
            name,
            self.log.display(),
            body
        );
        write_executable(&path, &script);
        path
    }

    /// Stubs for every tool that succeed and leave the expected outputs.
    pub fn install_default_stubs(&self) {
        self.write_stub("aapt", &aapt_body(&self.fixture_apk));
        self.write_stub("javac", JAVAC_BODY);
        self.write_stub("dx", DX_BODY);
        self.write_stub("jarsigner", &jarsigner_body(&self.signed_fixture_apk));
        self.write_stub("zipalign", "cp \"$2\" \"$3\"");
        self.write_stub("aidl", "exit 0");
        self.write_stub("llvm-rs-cc", "exit 0");
    }

    /// Builder pointing every tool at `bin/`, with no host environment.
    pub fn config_builder(&self) -> BuildConfigBuilder {
        let mut builder = BuildConfig::builder()
            .environment(Environment::new(None, None, Some(self.base.join("home"))))
            .output_name(OUTPUT_NAME)
            .platform_jar(self.base.join("android.jar"))
            .keystore(self.base.join("debug.keystore"))
            .tool_timeout(Duration::from_secs(30));
        for tool in Tool::ALL {
            builder = builder.tool_path(tool, self.bin.join(tool.file_name()));
        }
        builder
    }

    pub fn config(&self) -> BuildConfig {
        self.config_builder().build()
    }

    /// Lines written by the stubs so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Tool names in call order.
    pub fn call_sequence(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|line| line.split_whitespace().next().map(str::to_string))
            .collect()
    }
}

/// Minimal project: manifest, one resource, one source file.
pub fn create_project(project: &Path) {
    write(
        &project.join("AndroidManifest.xml"),
        r#"<manifest package="com.example.demo"/>"#,
    );
    write(
        &project.join("res/values/strings.xml"),
        r#"<resources><string name="app_name">Demo</string></resources>"#,
    );
    write(
        &project.join("java/com/example/demo/Main.java"),
        "package com.example.demo; public class Main {}",
    );
}

pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write file");
}

pub fn write_executable(path: &Path, content: &str) {
    // Write and close before chmod so the file is not busy when executed.
    {
        let mut file = File::create(path).expect("Failed to create script");
        file.write_all(content.as_bytes())
            .expect("Failed to write script");
        file.sync_all().expect("Failed to sync script");
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
}

const PACKAGED_ENTRIES: [(&str, &[u8]); 3] = [
    ("AndroidManifest.xml", b"<binary manifest>"),
    ("resources.arsc", b"<resource table>"),
    ("res/layout/main.xml", b"<layout>"),
];

/// Package as aapt would produce it, without classes.dex.
pub fn create_fixture_apk(path: &Path) {
    write_zip(path, &PACKAGED_ENTRIES);
}

/// Package as jarsigner leaves it: signature files first, then the payload.
pub fn create_signed_fixture_apk(path: &Path) {
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\n"[..]),
        ("META-INF/ANDROIDD.SF", &b"Signature-Version: 1.0\n"[..]),
        ("META-INF/ANDROIDD.RSA", &b"<pkcs7>"[..]),
    ];
    entries.extend(PACKAGED_ENTRIES);
    entries.push(("classes.dex", &b"dex\n035"[..]));
    write_zip(path, &entries);
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).expect("Failed to create fixture"));
    for &(name, data) in entries {
        writer
            .start_file(name, SimpleFileOptions::default())
            .expect("Failed to start entry");
        writer.write_all(data).expect("Failed to write entry");
    }
    writer.finish().expect("Failed to finish fixture");
}

fn aapt_body(fixture: &Path) -> String {
    format!(
        r#"gen=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -J) gen="$2"; shift ;;
    -F) out="$2"; shift ;;
  esac
  shift
done
if [ -n "$gen" ]; then
  mkdir -p "$gen/com/example/demo"
  echo "package com.example.demo; public final class R {{}}" > "$gen/com/example/demo/R.java"
fi
if [ -n "$out" ]; then
  cp '{}' "$out"
fi"#,
        fixture.display()
    )
}

/// The package is the second to last argument, before the key alias.
fn jarsigner_body(signed: &Path) -> String {
    format!(
        r#"apk=""
prev=""
for arg in "$@"; do
  apk="$prev"
  prev="$arg"
done
cp '{}' "$apk""#,
        signed.display()
    )
}

const JAVAC_BODY: &str = r#"dest=""
while [ $# -gt 0 ]; do
  case "$1" in
    -d) dest="$2"; shift ;;
  esac
  shift
done
mkdir -p "$dest/com/example/demo"
: > "$dest/com/example/demo/Main.class"
: > "$dest/com/example/demo/R.class""#;

const DX_BODY: &str = r#"for arg in "$@"; do
  case "$arg" in
    --output=*) out="${arg#--output=}" ;;
  esac
done
printf 'dex\n035' > "$out""#;

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.is_file(), "Expected file to exist: {}", path.display());
}

/// Assert that nothing exists at a path.
pub fn assert_absent(path: &Path) {
    assert!(!path.exists(), "Expected nothing at: {}", path.display());
}
