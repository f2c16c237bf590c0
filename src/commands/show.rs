//! Show command - displays configuration and platforms.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use apkbuild::config::BuildConfig;
use apkbuild::sdk::{InstalledPlatform, Tool};

/// Show target for the show command.
pub enum ShowTarget {
    /// Effective configuration and tool locations
    Config,
    /// Installed SDK platforms
    Platforms,
}

#[derive(Serialize)]
struct ConfigView<'a> {
    output_name: &'a str,
    api_level: u32,
    android_home: Option<PathBuf>,
    java_home: Option<PathBuf>,
    keystore: Option<PathBuf>,
    key_alias: &'a str,
    java_level: &'a str,
    tool_timeout_secs: Option<u64>,
    platform_jar: Option<PathBuf>,
    tools: Vec<ToolView>,
}

#[derive(Serialize)]
struct ToolView {
    tool: Tool,
    path: Option<PathBuf>,
    error: Option<String>,
}

impl<'a> ConfigView<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        let tools = Tool::ALL
            .into_iter()
            .map(|tool| match config.tool(tool) {
                Ok(path) => ToolView {
                    tool,
                    path: Some(path),
                    error: None,
                },
                Err(e) => ToolView {
                    tool,
                    path: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Self {
            output_name: config.output_name(),
            api_level: config.api_level(),
            android_home: config.android_home().map(PathBuf::from),
            java_home: config.java_home().map(PathBuf::from),
            keystore: config.keystore().ok(),
            key_alias: config.key_alias(),
            java_level: config.java_level(),
            tool_timeout_secs: config.tool_timeout().map(|t| t.as_secs()),
            platform_jar: config.platform_jar().ok(),
            tools,
        }
    }

    fn print(&self) {
        println!("Configuration:");
        println!("  Output name:  {}", self.output_name);
        println!("  API level:    {}", self.api_level);
        println!("  Android SDK:  {}", display_or_unset(&self.android_home));
        println!("  Java home:    {}", display_or_unset(&self.java_home));
        println!("  Keystore:     {}", display_or_unset(&self.keystore));
        println!("  Key alias:    {}", self.key_alias);
        println!("  Java level:   {}", self.java_level);
        match self.tool_timeout_secs {
            Some(secs) => println!("  Tool timeout: {}s", secs),
            None => println!("  Tool timeout: none"),
        }
        println!("  Platform jar: {}", display_or_unset(&self.platform_jar));
        println!();
        println!("Tools:");
        for view in &self.tools {
            match (&view.path, &view.error) {
                (Some(path), _) => println!("  {:<11} {}", view.tool.to_string(), path.display()),
                (None, Some(error)) => println!("  {:<11} ✗ {}", view.tool.to_string(), error),
                (None, None) => println!("  {:<11} ✗", view.tool.to_string()),
            }
        }
    }
}

fn display_or_unset(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unset)".to_string())
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &BuildConfig, json: bool) -> Result<()> {
    match target {
        ShowTarget::Config => {
            let view = ConfigView::new(config);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                view.print();
            }
        }
        ShowTarget::Platforms => {
            let platforms = config.platforms();
            if json {
                println!("{}", serde_json::to_string_pretty(platforms)?);
            } else {
                print_platforms(platforms, config.api_level());
            }
        }
    }
    Ok(())
}

fn print_platforms(platforms: &[InstalledPlatform], api_level: u32) {
    if platforms.is_empty() {
        println!("No installed platforms found.");
        return;
    }
    println!("Installed platforms:");
    for platform in platforms {
        let marker = if platform.api_level == api_level { "*" } else { " " };
        println!(
            " {} API {:<3} {:<8} {}",
            marker,
            platform.api_level,
            platform.version,
            platform.path.display()
        );
    }
}
