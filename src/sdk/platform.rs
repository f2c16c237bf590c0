//! Installed SDK platform discovery.
//!
//! A platform is a directory `<sdk>/platforms/android-*` holding a
//! `source.properties` file with both a `Platform.Version` and a numeric
//! `AndroidVersion.ApiLevel`. Anything else is skipped.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub const PLATFORMS_DIR: &str = "platforms";
pub const PLATFORM_DIR_PREFIX: &str = "android-";
pub const SOURCE_PROPERTIES_FILE: &str = "source.properties";
pub const API_LEVEL_PROPERTY: &str = "AndroidVersion.ApiLevel";
pub const PLATFORM_VERSION_PROPERTY: &str = "Platform.Version";

/// One SDK platform found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPlatform {
    pub api_level: u32,
    /// Version label, e.g. "4.2.2".
    pub version: String,
    /// Absolute platform directory.
    pub path: PathBuf,
}

impl Ord for InstalledPlatform {
    fn cmp(&self, other: &Self) -> Ordering {
        self.api_level
            .cmp(&other.api_level)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for InstalledPlatform {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse a Java-style `.properties` file into key/value pairs.
///
/// Supports `key=value` and `key:value`, `#`/`!` comment lines and
/// backslash-escaped separators. Line continuations are not supported.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut escaped = false;
        let mut split_at = None;
        for (i, ch) in line.char_indices() {
            match ch {
                '\\' if !escaped => escaped = true,
                '=' | ':' | ' ' | '\t' if !escaped => {
                    split_at = Some(i);
                    break;
                }
                _ => escaped = false,
            }
        }

        let (key, value) = match split_at {
            Some(i) => (&line[..i], &line[i + 1..]),
            None => (line, ""),
        };
        // A whitespace-terminated key may still be followed by one `=` or `:`.
        let mut value = value.trim_start();
        if split_at.is_some_and(|i| line[i..].starts_with([' ', '\t'])) {
            if let Some(rest) = value.strip_prefix(['=', ':']) {
                value = rest;
            }
        }
        props.insert(unescape(key.trim()), unescape(value.trim()));
    }
    props
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Read one platform directory, or `None` if it is not a valid platform.
pub fn read_platform(dir: &Path) -> Option<InstalledPlatform> {
    let props_path = dir.join(SOURCE_PROPERTIES_FILE);
    let content = match fs::read_to_string(&props_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Skipping platform {}: {}", dir.display(), e);
            return None;
        }
    };

    let props = parse_properties(&content);
    let (Some(version), Some(api_level)) = (
        props.get(PLATFORM_VERSION_PROPERTY),
        props.get(API_LEVEL_PROPERTY),
    ) else {
        tracing::debug!(
            "Skipping platform {}: {} lacks {} or {}",
            dir.display(),
            SOURCE_PROPERTIES_FILE,
            PLATFORM_VERSION_PROPERTY,
            API_LEVEL_PROPERTY
        );
        return None;
    };

    let api_level = match api_level.parse::<u32>() {
        Ok(level) => level,
        Err(_) => {
            tracing::debug!(
                "Skipping platform {}: non-numeric API level '{}'",
                dir.display(),
                api_level
            );
            return None;
        }
    };

    let path = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    Some(InstalledPlatform {
        api_level,
        version: version.clone(),
        path,
    })
}

/// Scan `<sdk_root>/platforms` and return every valid platform, ascending.
///
/// An unreadable or missing platforms directory yields an empty list.
pub fn discover_platforms(sdk_root: &Path) -> Vec<InstalledPlatform> {
    let platforms_dir = sdk_root.join(PLATFORMS_DIR);
    let entries = match fs::read_dir(&platforms_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot read {}: {}", platforms_dir.display(), e);
            return Vec::new();
        }
    };

    let mut platforms: Vec<InstalledPlatform> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(PLATFORM_DIR_PREFIX))
                .unwrap_or(false)
        })
        .filter_map(|p| read_platform(&p))
        .collect();

    platforms.sort();
    tracing::debug!(
        "Found {} installed platform(s) under {}",
        platforms.len(),
        platforms_dir.display()
    );
    platforms
}

/// The platform with `api_level`, else the highest installed one.
///
/// `platforms` must be sorted ascending, as returned by [`discover_platforms`].
pub fn select_platform(platforms: &[InstalledPlatform], api_level: u32) -> Option<&InstalledPlatform> {
    platforms
        .iter()
        .find(|p| p.api_level == api_level)
        .or_else(|| platforms.last())
}
