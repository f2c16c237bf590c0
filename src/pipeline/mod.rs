//! The seven-stage package build.
//!
//! ```text
//! ResourceCompile → SourceCompile → DexCompile → Package → InjectDex → Sign → Align
//! ```
//!
//! Stages run strictly in order and none can be skipped. Each one checks that
//! its predecessor left the expected input behind, resolves its tool through
//! the [`BuildConfig`] and runs it to completion. The first failure aborts the
//! build and everything produced so far stays in the workspace.

pub mod commands;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::process::{CancelToken, Cmd};
use crate::sdk::Tool;
use crate::timing::Timer;
use crate::workspace::{has_files, java_sources, Workspace};

use commands::Signing;

/// Entry the signing and aligning stages expect inside the package.
pub const DEX_ENTRY: &str = "classes.dex";

/// Manifest jarsigner adds; aligning requires a signed package.
pub const SIGNATURE_MANIFEST: &str = "META-INF/MANIFEST.MF";

/// One step of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ResourceCompile,
    SourceCompile,
    DexCompile,
    Package,
    InjectDex,
    Sign,
    Align,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::ResourceCompile,
        Stage::SourceCompile,
        Stage::DexCompile,
        Stage::Package,
        Stage::InjectDex,
        Stage::Sign,
        Stage::Align,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::ResourceCompile => "resource-compile",
            Stage::SourceCompile => "source-compile",
            Stage::DexCompile => "dex-compile",
            Stage::Package => "package",
            Stage::InjectDex => "inject-dex",
            Stage::Sign => "sign",
            Stage::Align => "align",
        }
    }

    /// The tool this stage runs. `InjectDex` works in-process.
    pub fn tool(self) -> Option<Tool> {
        match self {
            Stage::ResourceCompile | Stage::Package => Some(Tool::Aapt),
            Stage::SourceCompile => Some(Tool::Javac),
            Stage::DexCompile => Some(Tool::Dx),
            Stage::InjectDex => None,
            Stage::Sign => Some(Tool::Jarsigner),
            Stage::Align => Some(Tool::Zipalign),
        }
    }

    fn description(self) -> &'static str {
        match self {
            Stage::ResourceCompile => "Generating R.java",
            Stage::SourceCompile => "Compiling Java sources",
            Stage::DexCompile => "Converting classes to dex",
            Stage::Package => "Packaging resources",
            Stage::InjectDex => "Adding classes.dex to package",
            Stage::Sign => "Signing package",
            Stage::Align => "Aligning package",
        }
    }

    fn position(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).unwrap_or(0) + 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the stages against one workspace.
#[derive(Debug)]
pub struct Pipeline<'a> {
    workspace: &'a Workspace,
    config: &'a BuildConfig,
    cancel: CancelToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(workspace: &'a Workspace, config: &'a BuildConfig) -> Self {
        Self {
            workspace,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Share `token` with every tool this pipeline starts.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn workspace(&self) -> &Workspace {
        self.workspace
    }

    /// `target/<name>.apk.unaligned`
    pub fn unaligned_apk(&self) -> PathBuf {
        self.workspace.unaligned_apk(self.config.output_name())
    }

    /// `target/<name>.apk`
    pub fn output_apk(&self) -> PathBuf {
        self.workspace.final_apk(self.config.output_name())
    }

    /// Run every stage and return the path of the aligned package.
    pub fn build(&self) -> Result<PathBuf> {
        let total = Timer::start("Build");
        tracing::info!(
            "Building {} in {}",
            self.config.output_name(),
            self.workspace.root().display()
        );

        if self.config.strict() {
            self.config.validate()?;
        }

        for stage in Stage::ALL {
            self.run_stage(stage)?;
        }

        let output = self.output_apk();
        if !output.is_file() {
            return Err(Error::MissingOutput {
                stage: Stage::Align,
                path: output,
            });
        }

        total.finish();
        tracing::info!("Built {}", output.display());
        Ok(output)
    }

    /// Run a single stage. Its inputs must already be in the workspace.
    pub fn run_stage(&self, stage: Stage) -> Result<()> {
        self.check_inputs(stage)?;

        tracing::info!(
            "[{}/{}] {}",
            stage.position(),
            Stage::ALL.len(),
            stage.description()
        );
        let timer = Timer::start(stage.description());
        self.execute(stage)
            .map_err(|source| Error::Stage {
                stage,
                source: Box::new(source),
            })?;
        timer.finish();
        Ok(())
    }

    fn execute(&self, stage: Stage) -> Result<()> {
        let ws = self.workspace;
        let cmd = match stage {
            Stage::ResourceCompile => commands::resource_compile(
                &self.config.tool(Tool::Aapt)?,
                ws,
                &self.config.platform_jar()?,
            ),
            Stage::SourceCompile => {
                let sources = java_sources(&ws.java_dir())
                    .chain(java_sources(&ws.generated_sources_dir()))
                    .collect::<Result<Vec<_>>>()?;
                tracing::debug!("Compiling {} source file(s)", sources.len());
                commands::source_compile(
                    &self.config.tool(Tool::Javac)?,
                    self.config.java_level(),
                    &self.config.platform_jar()?,
                    ws,
                    sources,
                )
            }
            Stage::DexCompile => commands::dex_compile(&self.config.tool(Tool::Dx)?, ws),
            Stage::Package => {
                let include_assets = has_files(&ws.asset_dir());
                commands::package(
                    &self.config.tool(Tool::Aapt)?,
                    ws,
                    &self.config.platform_jar()?,
                    &self.unaligned_apk(),
                    include_assets,
                )
            }
            Stage::InjectDex => return archive::patch(&self.unaligned_apk(), &[ws.dex_file()]),
            Stage::Sign => {
                let keystore = self.config.keystore()?;
                let signing = Signing {
                    keystore: &keystore,
                    store_password: self.config.keystore_password(),
                    key_password: self.config.key_password(),
                    alias: self.config.key_alias(),
                };
                commands::sign(&self.config.tool(Tool::Jarsigner)?, &signing, &self.unaligned_apk())
            }
            Stage::Align => commands::align(
                &self.config.tool(Tool::Zipalign)?,
                &self.unaligned_apk(),
                &self.output_apk(),
            ),
        };
        self.run(cmd)
    }

    fn run(&self, cmd: Cmd) -> Result<()> {
        cmd.timeout(self.config.tool_timeout())
            .cancel_token(&self.cancel)
            .run()?;
        Ok(())
    }

    /// Verify the predecessor's output is present before anything runs.
    fn check_inputs(&self, stage: Stage) -> Result<()> {
        let ws = self.workspace;
        match stage {
            Stage::ResourceCompile => {
                require_file(stage, &ws.manifest())?;
                require_dir(stage, &ws.res_dir())
            }
            Stage::SourceCompile => {
                let generated = ws.generated_sources_dir();
                let any_source = java_sources(&generated).any(|source| source.is_ok());
                if any_source {
                    Ok(())
                } else {
                    Err(missing(stage, &generated))
                }
            }
            Stage::DexCompile => {
                let classes = ws.generated_classes_dir();
                if has_files(&classes) {
                    Ok(())
                } else {
                    Err(missing(stage, &classes))
                }
            }
            Stage::Package => require_file(stage, &ws.dex_file()),
            Stage::InjectDex => {
                require_file(stage, &self.unaligned_apk())?;
                require_file(stage, &ws.dex_file())
            }
            Stage::Sign => {
                let apk = self.unaligned_apk();
                require_file(stage, &apk)?;
                let has_dex = archive::contains_entry(&apk, DEX_ENTRY)
                    .map_err(|source| Error::Stage { stage, source: Box::new(source) })?;
                if has_dex {
                    Ok(())
                } else {
                    Err(missing(stage, &apk.join(DEX_ENTRY)))
                }
            }
            Stage::Align => {
                let entries = self.unaligned_entries(stage)?;
                if !entries.iter().any(|e| e == DEX_ENTRY) {
                    return Err(missing(stage, &self.unaligned_apk().join(DEX_ENTRY)));
                }
                let signed = entries.iter().any(|e| e == SIGNATURE_MANIFEST)
                    && entries.iter().any(|e| is_signature_file(e));
                if signed {
                    Ok(())
                } else {
                    Err(missing(stage, &self.unaligned_apk().join(SIGNATURE_MANIFEST)))
                }
            }
        }
    }

    /// Entry names of the unaligned package, which must exist.
    fn unaligned_entries(&self, stage: Stage) -> Result<Vec<String>> {
        let apk = self.unaligned_apk();
        require_file(stage, &apk)?;
        archive::entry_names(&apk).map_err(|source| Error::Stage {
            stage,
            source: Box::new(source),
        })
    }
}

/// jarsigner writes one `.SF` signature file per signer under `META-INF/`.
fn is_signature_file(entry: &str) -> bool {
    entry
        .strip_prefix("META-INF/")
        .is_some_and(|name| !name.contains('/') && name.to_ascii_uppercase().ends_with(".SF"))
}

fn missing(stage: Stage, path: &Path) -> Error {
    Error::MissingInput {
        stage,
        path: path.to_path_buf(),
    }
}

fn require_file(stage: Stage, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(missing(stage, path))
    }
}

fn require_dir(stage: Stage, path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(missing(stage, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::write_file_with_dirs;
    use crate::config::Environment;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn config() -> BuildConfig {
        let mut builder = BuildConfig::builder()
            .environment(Environment::new(None, None, Some(PathBuf::from("/home/dev"))))
            .output_name("demo")
            .platform_jar("/nowhere/android.jar");
        for tool in Tool::ALL {
            builder = builder.tool_path(tool, format!("/nowhere/{}", tool));
        }
        builder.build()
    }

    fn workspace(temp: &TempDir) -> Workspace {
        Workspace::open(temp.path()).unwrap()
    }

    fn write_zip(path: &Path, names: &[&str]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for name in names {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(b"x").unwrap();
        }
        writer.finish().unwrap();
    }

    fn missing_input(err: Error) -> (Stage, PathBuf) {
        match err {
            Error::MissingInput { stage, path } => (stage, path),
            other => panic!("expected missing input, got {other:?}"),
        }
    }

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "resource-compile",
                "source-compile",
                "dex-compile",
                "package",
                "inject-dex",
                "sign",
                "align"
            ]
        );
        assert_eq!(Stage::InjectDex.tool(), None);
        assert_eq!(Stage::Package.tool(), Some(Tool::Aapt));
    }

    #[test]
    fn test_every_stage_rejects_empty_workspace() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);

        for stage in Stage::ALL {
            let err = pipeline.run_stage(stage).unwrap_err();
            let (failed, _) = missing_input(err);
            assert_eq!(failed, stage);
        }
    }

    #[test]
    fn test_resource_compile_needs_manifest_and_res() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);

        let (_, path) = missing_input(pipeline.run_stage(Stage::ResourceCompile).unwrap_err());
        assert_eq!(path, ws.manifest());

        fs::remove_dir(ws.res_dir()).unwrap();
        write_file_with_dirs(ws.manifest(), "<manifest/>").unwrap();
        let (_, path) = missing_input(pipeline.run_stage(Stage::ResourceCompile).unwrap_err());
        assert_eq!(path, ws.res_dir());
    }

    #[test]
    fn test_source_compile_needs_generated_sources() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        // Application sources alone are not enough.
        write_file_with_dirs(ws.java_dir().join("Main.java"), "class Main {}").unwrap();

        let (_, path) = missing_input(pipeline.run_stage(Stage::SourceCompile).unwrap_err());

        assert_eq!(path, ws.generated_sources_dir());
    }

    #[test]
    fn test_inputs_checked_before_tool_resolution() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        // No overrides and no SDK: resolution would be a configuration error.
        let config = BuildConfig::builder()
            .environment(Environment::new(None, None, None))
            .build();
        let pipeline = Pipeline::new(&ws, &config);

        let err = pipeline.run_stage(Stage::DexCompile).unwrap_err();

        assert!(matches!(err, Error::MissingInput { .. }));
    }

    #[test]
    fn test_tool_failure_is_wrapped_in_stage_error() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        write_file_with_dirs(ws.generated_classes_dir().join("Main.class"), "").unwrap();

        let err = pipeline.run_stage(Stage::DexCompile).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::DexCompile));
        assert!(err.command_line().unwrap().starts_with("/nowhere/dx --dex"));
    }

    #[test]
    fn test_inject_dex_patches_unaligned_package() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        write_zip(&pipeline.unaligned_apk(), &["AndroidManifest.xml", "resources.arsc"]);
        fs::write(ws.dex_file(), b"dex\n035").unwrap();

        pipeline.run_stage(Stage::InjectDex).unwrap();

        assert_eq!(
            archive::entry_names(&pipeline.unaligned_apk()).unwrap(),
            vec!["AndroidManifest.xml", "resources.arsc", "classes.dex"]
        );
    }

    #[test]
    fn test_sign_and_align_need_dex_entry() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        write_zip(&pipeline.unaligned_apk(), &["AndroidManifest.xml"]);

        for stage in [Stage::Sign, Stage::Align] {
            let (failed, path) = missing_input(pipeline.run_stage(stage).unwrap_err());
            assert_eq!(failed, stage);
            assert!(path.ends_with("classes.dex"));
        }
    }

    #[test]
    fn test_align_needs_signed_package() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        write_zip(&pipeline.unaligned_apk(), &["classes.dex"]);

        let (failed, path) = missing_input(pipeline.run_stage(Stage::Align).unwrap_err());

        assert_eq!(failed, Stage::Align);
        assert_eq!(path, pipeline.unaligned_apk().join("META-INF/MANIFEST.MF"));
        assert!(!pipeline.output_apk().exists());

        // A manifest without a signature file is still unsigned.
        write_zip(
            &pipeline.unaligned_apk(),
            &["classes.dex", "META-INF/MANIFEST.MF"],
        );
        let (failed, _) = missing_input(pipeline.run_stage(Stage::Align).unwrap_err());
        assert_eq!(failed, Stage::Align);
    }

    #[test]
    fn test_signed_package_passes_align_input_check() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = config();
        let pipeline = Pipeline::new(&ws, &config);
        write_zip(
            &pipeline.unaligned_apk(),
            &[
                "META-INF/MANIFEST.MF",
                "META-INF/ANDROIDD.SF",
                "META-INF/ANDROIDD.RSA",
                "classes.dex",
            ],
        );

        // Inputs are accepted, so the failure comes from the missing zipalign.
        let err = pipeline.run_stage(Stage::Align).unwrap_err();

        assert!(matches!(err, Error::Stage { stage: Stage::Align, .. }));
    }

    #[test]
    fn test_signature_file_detection() {
        assert!(is_signature_file("META-INF/CERT.SF"));
        assert!(is_signature_file("META-INF/androidd.sf"));
        assert!(!is_signature_file("META-INF/MANIFEST.MF"));
        assert!(!is_signature_file("META-INF/sub/CERT.SF"));
        assert!(!is_signature_file("res/CERT.SF"));
    }

    #[test]
    fn test_strict_build_validates_first() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let config = BuildConfig::builder()
            .environment(Environment::new(None, None, None))
            .tool_path(Tool::Aapt, "/nowhere/aapt")
            .strict(true)
            .build();

        let err = Pipeline::new(&ws, &config).build().unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.stage(), None);
    }
}
