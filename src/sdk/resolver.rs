//! Tool path resolution.
//!
//! Each tool is looked up through an ordered chain of path builders. A
//! builder only runs once every builder before it has come up empty, and
//! the first candidate that exists as a non-directory file wins.
//!
//! | kind         | tools                      | probe order                                                        |
//! |--------------|----------------------------|--------------------------------------------------------------------|
//! | `BuildTools` | aapt, aidl, dx, llvm-rs-cc | `<platform>/tools/`, then `<sdk>/build-tools/*/` ascending          |
//! | `SdkTools`   | zipalign                   | `<sdk>/tools/` (+`.exe`, `.bat`), `<sdk>/platform-tools/`, build-tools |
//! | `Jdk`        | javac, jarsigner           | `<java-home>/bin/` (+`.exe`)                                        |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::platform::{discover_platforms, select_platform, InstalledPlatform};
use crate::error::{Error, Result};

pub const BUILD_TOOLS_DIR: &str = "build-tools";
pub const TOOLS_DIR: &str = "tools";
pub const PLATFORM_TOOLS_DIR: &str = "platform-tools";
pub const PLATFORM_JAR: &str = "android.jar";

/// External programs the build knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    Aapt,
    Aidl,
    Dx,
    LlvmRsCc,
    Zipalign,
    Javac,
    Jarsigner,
}

/// Where a tool lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Versioned SDK build tools.
    BuildTools,
    /// Version-independent SDK tools.
    SdkTools,
    /// Hosted by the Java runtime.
    Jdk,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Aapt,
        Tool::Aidl,
        Tool::Dx,
        Tool::LlvmRsCc,
        Tool::Zipalign,
        Tool::Javac,
        Tool::Jarsigner,
    ];

    /// Executable name on disk, without platform suffix.
    pub fn file_name(self) -> &'static str {
        match self {
            Tool::Aapt => "aapt",
            Tool::Aidl => "aidl",
            Tool::Dx => "dx",
            Tool::LlvmRsCc => "llvm-rs-cc",
            Tool::Zipalign => "zipalign",
            Tool::Javac => "javac",
            Tool::Jarsigner => "jarsigner",
        }
    }

    pub fn kind(self) -> ToolKind {
        match self {
            Tool::Aapt | Tool::Aidl | Tool::Dx | Tool::LlvmRsCc => ToolKind::BuildTools,
            Tool::Zipalign => ToolKind::SdkTools,
            Tool::Javac | Tool::Jarsigner => ToolKind::Jdk,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

type PathBuilder<'a> = Box<dyn FnOnce() -> Vec<PathBuf> + 'a>;

fn builder<'a>(build: impl FnOnce() -> Vec<PathBuf> + 'a) -> PathBuilder<'a> {
    Box::new(build)
}

/// Locates SDK platforms and tools for one SDK root, Java home and API level.
///
/// Installed platforms are discovered once, at construction.
#[derive(Debug, Clone)]
pub struct SdkResolver {
    sdk_root: Option<PathBuf>,
    java_home: Option<PathBuf>,
    api_level: u32,
    platforms: Vec<InstalledPlatform>,
}

impl SdkResolver {
    pub fn new(sdk_root: Option<PathBuf>, java_home: Option<PathBuf>, api_level: u32) -> Self {
        let platforms = sdk_root
            .as_deref()
            .map(discover_platforms)
            .unwrap_or_default();
        Self {
            sdk_root,
            java_home,
            api_level,
            platforms,
        }
    }

    /// Installed platforms, ascending by API level.
    pub fn platforms(&self) -> &[InstalledPlatform] {
        &self.platforms
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    fn sdk_root(&self) -> Result<&Path> {
        self.sdk_root.as_deref().ok_or_else(|| {
            Error::Configuration(
                "Android SDK location is not set; set ANDROID_HOME or configure the SDK root"
                    .to_string(),
            )
        })
    }

    fn java_home(&self) -> Result<&Path> {
        self.java_home.as_deref().ok_or_else(|| {
            Error::Configuration(
                "Java home is not set; set JAVA_HOME or configure the Java runtime root"
                    .to_string(),
            )
        })
    }

    /// The platform matching the API level, or the highest installed one.
    pub fn selected_platform(&self) -> Result<&InstalledPlatform> {
        let sdk = self.sdk_root()?;
        let platform = select_platform(&self.platforms, self.api_level).ok_or_else(|| {
            Error::Configuration(format!(
                "no installed platform found under {}",
                sdk.join(super::platform::PLATFORMS_DIR).display()
            ))
        })?;
        if platform.api_level != self.api_level {
            tracing::debug!(
                "API level {} not installed, using {} ({})",
                self.api_level,
                platform.api_level,
                platform.version
            );
        }
        Ok(platform)
    }

    /// `<selected platform>/android.jar`. Existence is not checked here.
    pub fn platform_jar(&self) -> Result<PathBuf> {
        Ok(self.selected_platform()?.path.join(PLATFORM_JAR))
    }

    /// Probe the candidate chain for `tool` and return the first hit.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        let mut tried = Vec::new();
        for candidate in self.candidates(tool)? {
            if candidate.exists() && !candidate.is_dir() {
                let path = std::path::absolute(&candidate).map_err(|e| Error::io(&candidate, e))?;
                tracing::debug!("Resolved {} to {}", tool, path.display());
                return Ok(path);
            }
            tracing::trace!("No {} at {}", tool, candidate.display());
            tried.push(candidate);
        }
        Err(Error::ToolNotFound { tool, tried })
    }

    /// Every candidate path for `tool`, in probe order, built lazily.
    ///
    /// Fails up front when the roots the chain depends on are not configured.
    pub fn candidates(&self, tool: Tool) -> Result<impl Iterator<Item = PathBuf> + '_> {
        let name = tool.file_name();
        let builders: Vec<PathBuilder<'_>> = match tool.kind() {
            ToolKind::BuildTools => {
                let platform = self.selected_platform()?.path.as_path();
                let sdk = self.sdk_root()?;
                vec![
                    builder(move || vec![platform.join(TOOLS_DIR).join(name)]),
                    builder(move || in_build_tools(sdk, name)),
                ]
            }
            ToolKind::SdkTools => {
                let sdk = self.sdk_root()?;
                vec![
                    builder(move || {
                        let tools = sdk.join(TOOLS_DIR);
                        vec![
                            tools.join(name),
                            tools.join(format!("{}.exe", name)),
                            tools.join(format!("{}.bat", name)),
                        ]
                    }),
                    builder(move || vec![sdk.join(PLATFORM_TOOLS_DIR).join(name)]),
                    builder(move || in_build_tools(sdk, name)),
                ]
            }
            ToolKind::Jdk => {
                let bin = self.java_home()?.join("bin");
                vec![builder(move || {
                    vec![bin.join(name), bin.join(format!("{}.exe", name))]
                })]
            }
        };
        Ok(builders.into_iter().flat_map(|build| build()))
    }
}

/// `<sdk>/build-tools/<version>/<name>` for every version, ascending.
fn in_build_tools(sdk: &Path, name: &str) -> Vec<PathBuf> {
    let dir = sdk.join(BUILD_TOOLS_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot read {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut versions: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort();
    versions.into_iter().map(|v| v.join(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::write_file_with_dirs;
    use tempfile::TempDir;

    fn add_platform(sdk: &Path, api: u32) -> PathBuf {
        let dir = sdk.join(format!("platforms/android-{}", api));
        write_file_with_dirs(
            dir.join("source.properties"),
            format!("Platform.Version=v{api}\nAndroidVersion.ApiLevel={api}\n"),
        )
        .unwrap();
        dir
    }

    fn touch(path: &Path) {
        write_file_with_dirs(path, "#!/bin/sh\n").unwrap();
    }

    fn resolver(sdk: &Path, api: u32) -> SdkResolver {
        SdkResolver::new(Some(sdk.to_path_buf()), None, api)
    }

    #[test]
    fn test_tool_kinds() {
        assert_eq!(Tool::Aapt.kind(), ToolKind::BuildTools);
        assert_eq!(Tool::LlvmRsCc.kind(), ToolKind::BuildTools);
        assert_eq!(Tool::Zipalign.kind(), ToolKind::SdkTools);
        assert_eq!(Tool::Jarsigner.kind(), ToolKind::Jdk);
        assert_eq!(Tool::LlvmRsCc.to_string(), "llvm-rs-cc");
    }

    #[test]
    fn test_platform_tools_dir_wins_over_build_tools() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        let platform = add_platform(sdk, 17);
        touch(&platform.join("tools/aapt"));
        touch(&sdk.join("build-tools/17.0.0/aapt"));

        let path = resolver(sdk, 17).resolve(Tool::Aapt).unwrap();

        assert_eq!(path, std::path::absolute(platform.join("tools/aapt")).unwrap());
    }

    #[test]
    fn test_build_tools_visited_in_ascending_order() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        add_platform(sdk, 17);
        touch(&sdk.join("build-tools/19.0.0/dx"));
        touch(&sdk.join("build-tools/17.0.0/dx"));
        fs::create_dir_all(sdk.join("build-tools/16.0.0")).unwrap();

        let path = resolver(sdk, 17).resolve(Tool::Dx).unwrap();

        assert!(path.ends_with("build-tools/17.0.0/dx"));
    }

    #[test]
    fn test_directory_is_not_a_tool() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        let platform = add_platform(sdk, 17);
        fs::create_dir_all(platform.join("tools/aidl")).unwrap();
        touch(&sdk.join("build-tools/18.1.0/aidl"));

        let path = resolver(sdk, 17).resolve(Tool::Aidl).unwrap();

        assert!(path.ends_with("build-tools/18.1.0/aidl"));
    }

    #[test]
    fn test_build_tools_use_highest_platform_when_level_missing() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        let d15 = add_platform(sdk, 15);
        let d19 = add_platform(sdk, 19);
        touch(&d15.join("tools/aapt"));
        touch(&d19.join("tools/aapt"));

        let resolver = resolver(sdk, 17);

        assert_eq!(resolver.selected_platform().unwrap().api_level, 19);
        assert!(resolver.resolve(Tool::Aapt).unwrap().starts_with(std::path::absolute(&d19).unwrap()));
        assert!(resolver.platform_jar().unwrap().ends_with("android-19/android.jar"));
    }

    #[test]
    fn test_zipalign_probe_order() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        touch(&sdk.join("platform-tools/zipalign"));
        touch(&sdk.join("tools/zipalign.bat"));

        let path = resolver(sdk, 17).resolve(Tool::Zipalign).unwrap();
        assert!(path.ends_with("tools/zipalign.bat"));

        touch(&sdk.join("tools/zipalign"));
        let path = resolver(sdk, 17).resolve(Tool::Zipalign).unwrap();
        assert!(path.ends_with("tools/zipalign"));
    }

    #[test]
    fn test_zipalign_falls_back_to_build_tools() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        touch(&sdk.join("build-tools/23.0.1/zipalign"));

        let path = resolver(sdk, 17).resolve(Tool::Zipalign).unwrap();

        assert!(path.ends_with("build-tools/23.0.1/zipalign"));
    }

    #[test]
    fn test_zipalign_does_not_need_a_platform() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("platform-tools/zipalign"));

        assert!(resolver(temp.path(), 17).resolve(Tool::Zipalign).is_ok());
    }

    #[test]
    fn test_jdk_tools_come_from_java_home() {
        let temp = TempDir::new().unwrap();
        let jdk = temp.path().join("jdk");
        touch(&jdk.join("bin/javac"));

        let resolver = SdkResolver::new(None, Some(jdk.clone()), 17);

        assert_eq!(
            resolver.resolve(Tool::Javac).unwrap(),
            std::path::absolute(jdk.join("bin/javac")).unwrap()
        );
        let err = resolver.resolve(Tool::Jarsigner).unwrap_err();
        match err {
            Error::ToolNotFound { tool, tried } => {
                assert_eq!(tool, Tool::Jarsigner);
                assert_eq!(tried[0], jdk.join("bin/jarsigner"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_reports_paths_in_probe_order() {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path();
        let platform = add_platform(sdk, 17);
        fs::create_dir_all(sdk.join("build-tools/17.0.0")).unwrap();
        fs::create_dir_all(sdk.join("build-tools/18.0.0")).unwrap();

        let err = resolver(sdk, 17).resolve(Tool::Aapt).unwrap_err();

        match err {
            Error::ToolNotFound { tried, .. } => {
                let expected = vec![
                    std::path::absolute(&platform).unwrap().join("tools/aapt"),
                    sdk.join("build-tools/17.0.0/aapt"),
                    sdk.join("build-tools/18.0.0/aapt"),
                ];
                assert_eq!(tried, expected);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_roots_are_configuration_errors() {
        let resolver = SdkResolver::new(None, None, 17);
        assert!(matches!(
            resolver.resolve(Tool::Aapt).unwrap_err(),
            Error::Configuration(_)
        ));
        assert!(matches!(
            resolver.resolve(Tool::Zipalign).unwrap_err(),
            Error::Configuration(_)
        ));
        assert!(matches!(
            resolver.resolve(Tool::Javac).unwrap_err(),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn test_no_installed_platform_is_fatal_for_build_tools() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("build-tools/17.0.0/aapt"));

        let err = resolver(temp.path(), 17).resolve(Tool::Aapt).unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
    }
}
