//! Build configuration.
//!
//! A [`BuildConfig`] is assembled once through [`BuildConfigBuilder`] and never
//! changes afterwards. Values derived from the SDK (installed platforms, tool
//! locations, the platform jar) are computed on first use and cached for the
//! lifetime of the configuration. Explicit overrides always win.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::common::random_hex;
use crate::error::{Error, Result};
use crate::sdk::{InstalledPlatform, SdkResolver, Tool};

pub const DEFAULT_API_LEVEL: u32 = 17;
pub const DEFAULT_STORE_PASSWORD: &str = "android";
pub const DEFAULT_KEY_ALIAS: &str = "androiddebugkey";
pub const DEFAULT_KEY_PASSWORD: &str = "android";
pub const DEFAULT_JAVA_LEVEL: &str = "1.6";
/// Keystore location relative to the user's home directory.
pub const DEBUG_KEYSTORE: &str = ".android/debug.keystore";

const OUTPUT_NAME_LEN: usize = 8;

/// Host values the configuration falls back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub android_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl Environment {
    pub fn new(
        android_home: Option<PathBuf>,
        java_home: Option<PathBuf>,
        home_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            android_home,
            java_home,
            home_dir,
        }
    }

    /// Read `ANDROID_HOME`, `JAVA_HOME` and the user's home directory now.
    ///
    /// Empty variables count as unset.
    pub fn capture() -> Self {
        Self {
            android_home: env_path("ANDROID_HOME"),
            java_home: env_path("JAVA_HOME"),
            home_dir: dirs::home_dir(),
        }
    }

    /// The environment of this process, captured on first call.
    pub fn process() -> &'static Environment {
        static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();
        ENVIRONMENT.get_or_init(Environment::capture)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Settings for one or more builds.
///
/// `Send + Sync`: the caches are behind `OnceLock`/`Mutex` so one
/// configuration may be shared by concurrent builds in distinct workspaces.
#[derive(Debug)]
pub struct BuildConfig {
    output_name: String,
    api_level: u32,
    android_home: Option<PathBuf>,
    java_home: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    tool_overrides: HashMap<Tool, PathBuf>,
    platform_jar_override: Option<PathBuf>,
    keystore: Option<PathBuf>,
    keystore_password: String,
    key_alias: String,
    key_password: String,
    java_level: String,
    tool_timeout: Option<Duration>,
    strict: bool,

    resolver: OnceLock<SdkResolver>,
    tools: Mutex<HashMap<Tool, PathBuf>>,
    platform_jar: OnceLock<PathBuf>,
}

impl BuildConfig {
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Base name of the produced package, without extension.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    pub fn android_home(&self) -> Option<&Path> {
        self.android_home.as_deref()
    }

    pub fn java_home(&self) -> Option<&Path> {
        self.java_home.as_deref()
    }

    /// Configured keystore, or the debug keystore under the home directory.
    pub fn keystore(&self) -> Result<PathBuf> {
        if let Some(path) = &self.keystore {
            return Ok(path.clone());
        }
        self.home_dir
            .as_ref()
            .map(|home| home.join(DEBUG_KEYSTORE))
            .ok_or_else(|| {
                Error::Configuration(
                    "no keystore configured and the home directory is unknown".to_string(),
                )
            })
    }

    pub fn keystore_password(&self) -> &str {
        &self.keystore_password
    }

    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    pub fn key_password(&self) -> &str {
        &self.key_password
    }

    /// Value for javac `-source` and `-target`.
    pub fn java_level(&self) -> &str {
        &self.java_level
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout
    }

    /// Whether the pipeline validates every tool before the first stage.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Overrides set through [`BuildConfigBuilder::tool_path`].
    pub fn tool_override(&self, tool: Tool) -> Option<&Path> {
        self.tool_overrides.get(&tool).map(PathBuf::as_path)
    }

    /// Resolver bound to this configuration. Platforms are scanned once.
    pub fn resolver(&self) -> &SdkResolver {
        self.resolver.get_or_init(|| {
            SdkResolver::new(
                self.android_home.clone(),
                self.java_home.clone(),
                self.api_level,
            )
        })
    }

    /// Installed platforms, ascending by API level.
    pub fn platforms(&self) -> &[InstalledPlatform] {
        self.resolver().platforms()
    }

    /// Path to `tool`: the override if one is set, else the cached resolution.
    pub fn tool(&self, tool: Tool) -> Result<PathBuf> {
        if let Some(path) = self.tool_overrides.get(&tool) {
            return Ok(path.clone());
        }

        let mut cache = self
            .tools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(path) = cache.get(&tool) {
            return Ok(path.clone());
        }
        let path = self.resolver().resolve(tool)?;
        cache.insert(tool, path.clone());
        Ok(path)
    }

    /// The platform jar passed to aapt and javac.
    pub fn platform_jar(&self) -> Result<PathBuf> {
        if let Some(path) = &self.platform_jar_override {
            return Ok(path.clone());
        }
        if let Some(path) = self.platform_jar.get() {
            return Ok(path.clone());
        }
        let path = self.resolver().platform_jar()?;
        Ok(self.platform_jar.get_or_init(|| path).clone())
    }

    /// Check every tool and the platform jar, failing on the first problem.
    pub fn validate(&self) -> Result<()> {
        for tool in Tool::ALL {
            let path = self.tool(tool)?;
            check_regular_file(&format!("tool '{}'", tool), &path)?;
        }
        let jar = self.platform_jar()?;
        check_regular_file("platform jar", &jar)?;
        tracing::debug!("Configuration validated");
        Ok(())
    }
}

fn check_regular_file(subject: &str, path: &Path) -> Result<()> {
    let reason = if !path.exists() {
        "does not exist"
    } else if !path.is_file() {
        "is not a regular file"
    } else {
        return Ok(());
    };
    Err(Error::Validation {
        subject: subject.to_string(),
        path: path.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// Builder for [`BuildConfig`]. Anything left unset gets its default.
#[derive(Debug, Clone, Default)]
pub struct BuildConfigBuilder {
    environment: Option<Environment>,
    output_name: Option<String>,
    api_level: Option<u32>,
    android_home: Option<PathBuf>,
    java_home: Option<PathBuf>,
    tool_overrides: HashMap<Tool, PathBuf>,
    platform_jar: Option<PathBuf>,
    keystore: Option<PathBuf>,
    keystore_password: Option<String>,
    key_alias: Option<String>,
    key_password: Option<String>,
    java_level: Option<String>,
    tool_timeout: Option<Duration>,
    strict: bool,
}

impl BuildConfigBuilder {
    /// Use `environment` for fallbacks instead of [`Environment::process`].
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn api_level(mut self, level: u32) -> Self {
        self.api_level = Some(level);
        self
    }

    pub fn android_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.android_home = Some(path.into());
        self
    }

    pub fn java_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.java_home = Some(path.into());
        self
    }

    /// Use `path` for `tool` without probing the SDK.
    pub fn tool_path(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        self.tool_overrides.insert(tool, path.into());
        self
    }

    pub fn platform_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.platform_jar = Some(path.into());
        self
    }

    pub fn keystore(mut self, path: impl Into<PathBuf>) -> Self {
        self.keystore = Some(path.into());
        self
    }

    pub fn keystore_password(mut self, password: impl Into<String>) -> Self {
        self.keystore_password = Some(password.into());
        self
    }

    pub fn key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = Some(alias.into());
        self
    }

    pub fn key_password(mut self, password: impl Into<String>) -> Self {
        self.key_password = Some(password.into());
        self
    }

    pub fn java_level(mut self, level: impl Into<String>) -> Self {
        self.java_level = Some(level.into());
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> BuildConfig {
        let environment = self
            .environment
            .unwrap_or_else(|| Environment::process().clone());

        let output_name = self
            .output_name
            .unwrap_or_else(|| random_hex(OUTPUT_NAME_LEN));

        BuildConfig {
            output_name,
            api_level: self.api_level.unwrap_or(DEFAULT_API_LEVEL),
            android_home: self.android_home.or(environment.android_home),
            java_home: self.java_home.or(environment.java_home),
            home_dir: environment.home_dir,
            tool_overrides: self.tool_overrides,
            platform_jar_override: self.platform_jar,
            keystore: self.keystore,
            keystore_password: self
                .keystore_password
                .unwrap_or_else(|| DEFAULT_STORE_PASSWORD.to_string()),
            key_alias: self
                .key_alias
                .unwrap_or_else(|| DEFAULT_KEY_ALIAS.to_string()),
            key_password: self
                .key_password
                .unwrap_or_else(|| DEFAULT_KEY_PASSWORD.to_string()),
            java_level: self
                .java_level
                .unwrap_or_else(|| DEFAULT_JAVA_LEVEL.to_string()),
            tool_timeout: self.tool_timeout,
            strict: self.strict,
            resolver: OnceLock::new(),
            tools: Mutex::new(HashMap::new()),
            platform_jar: OnceLock::new(),
        }
    }
}
