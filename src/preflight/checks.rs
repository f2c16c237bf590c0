//! Individual SDK and JDK checks.

use std::path::Path;

use crate::config::BuildConfig;
use crate::sdk::{Tool, ToolKind};

use super::types::CheckResult;

/// SDK and Java roots.
pub fn check_roots(config: &BuildConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match config.android_home() {
        Some(sdk) if sdk.is_dir() => {
            results.push(CheckResult::pass_with("Android SDK", &sdk.display().to_string()))
        }
        Some(sdk) => results.push(CheckResult::fail(
            "Android SDK",
            &format!("{} is not a directory", sdk.display()),
        )),
        None => results.push(CheckResult::fail(
            "Android SDK",
            "Not set. Export ANDROID_HOME or pass --android-home.",
        )),
    }

    match config.java_home() {
        Some(jdk) if jdk.is_dir() => {
            results.push(CheckResult::pass_with("Java home", &jdk.display().to_string()))
        }
        Some(jdk) => results.push(CheckResult::fail(
            "Java home",
            &format!("{} is not a directory", jdk.display()),
        )),
        None => results.push(CheckResult::fail(
            "Java home",
            "Not set. Export JAVA_HOME or pass --java-home.",
        )),
    }

    results
}

/// Selected platform and its jar.
pub fn check_platform(config: &BuildConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let wanted = config.api_level();

    if config.android_home().is_some() {
        match config.resolver().selected_platform() {
            Ok(platform) if platform.api_level == wanted => results.push(CheckResult::pass_with(
                "Platform",
                &format!("API {} ({})", platform.api_level, platform.version),
            )),
            Ok(platform) => results.push(CheckResult::warn(
                "Platform",
                &format!(
                    "API {} not installed, using API {} ({})",
                    wanted, platform.api_level, platform.version
                ),
            )),
            Err(e) => results.push(CheckResult::fail("Platform", &e.to_string())),
        }
    }

    match config.platform_jar() {
        Ok(jar) => results.push(check_file("android.jar", &jar)),
        Err(e) => results.push(CheckResult::skip("android.jar", &e.to_string())),
    }

    results
}

/// Every tool the build or validation needs.
pub fn check_tools(config: &BuildConfig) -> Vec<CheckResult> {
    Tool::ALL
        .into_iter()
        .map(|tool| {
            let name = tool.file_name();
            match config.tool(tool) {
                Ok(path) => check_file(name, &path),
                Err(e) => {
                    let mut details = e.to_string();
                    if let Some(hint) = path_hint(tool) {
                        details.push_str(&format!(". {}", hint));
                    }
                    CheckResult::fail(name, &details)
                }
            }
        })
        .collect()
}

/// Keystore used for signing. Missing is only a warning: jarsigner reports it.
pub fn check_keystore(config: &BuildConfig) -> CheckResult {
    match config.keystore() {
        Ok(path) if path.is_file() => {
            CheckResult::pass_with("Keystore", &path.display().to_string())
        }
        Ok(path) => CheckResult::warn(
            "Keystore",
            &format!(
                "{} not found - signing will fail unless it is created first",
                path.display()
            ),
        ),
        Err(e) => CheckResult::warn("Keystore", &e.to_string()),
    }
}

fn check_file(name: &str, path: &Path) -> CheckResult {
    if path.is_file() {
        CheckResult::pass_with(name, &path.display().to_string())
    } else if path.exists() {
        CheckResult::fail(name, &format!("{} is not a regular file", path.display()))
    } else {
        CheckResult::fail(name, &format!("{} does not exist", path.display()))
    }
}

/// JDK tools found on PATH hint at the right Java home.
fn path_hint(tool: Tool) -> Option<String> {
    if tool.kind() != ToolKind::Jdk {
        return None;
    }
    let found = which::which(tool.file_name()).ok()?;
    let home = found.parent()?.parent()?;
    Some(format!(
        "Found {} on PATH; try JAVA_HOME={}",
        found.display(),
        home.display()
    ))
}
