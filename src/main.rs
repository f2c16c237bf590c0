//! apkbuild - Android package builder.
//!
//! Runs aapt, javac, dx, jarsigner and zipalign over a prepared workspace
//! and produces `target/<name>.apk`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apkbuild::config::BuildConfig;

#[derive(Parser)]
#[command(name = "apkbuild")]
#[command(about = "Android package builder")]
#[command(
    after_help = "QUICK START:\n  apkbuild preflight        Check SDK, JDK and keystore\n  apkbuild build <dir>      Build a package from a project directory\n  apkbuild show platforms   List installed platforms"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a package from a project directory
    Build {
        /// Directory holding AndroidManifest.xml, res/, java/, class/ and asset/
        input: PathBuf,

        /// Build inside INPUT instead of a fresh copy of it
        #[arg(long)]
        in_place: bool,

        /// Copy the finished package here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delete the copied workspace after a successful build
        #[arg(long, requires = "output", conflicts_with = "in_place")]
        remove_workspace: bool,

        /// Validate every tool and the platform jar before the first stage
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Check SDK, JDK and keystore before building
    Preflight {
        /// Exit with an error if any check fails
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,

        /// Print JSON instead of text
        #[arg(long, global = true)]
        json: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show the effective configuration and resolved tools
    Config,
    /// List installed SDK platforms
    Platforms,
}

/// Settings shared by every command.
#[derive(Args)]
struct ConfigArgs {
    /// Base name of the package (default: random)
    #[arg(long, global = true)]
    name: Option<String>,

    /// Target API level
    #[arg(long, global = true)]
    api_level: Option<u32>,

    /// Android SDK root (default: $ANDROID_HOME)
    #[arg(long, global = true)]
    android_home: Option<PathBuf>,

    /// Java runtime root (default: $JAVA_HOME)
    #[arg(long, global = true)]
    java_home: Option<PathBuf>,

    /// Keystore for signing (default: ~/.android/debug.keystore)
    #[arg(long, global = true)]
    keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, global = true)]
    storepass: Option<String>,

    /// Key alias
    #[arg(long, global = true)]
    alias: Option<String>,

    /// Key password
    #[arg(long, global = true)]
    keypass: Option<String>,

    /// Kill any tool running longer than this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

impl ConfigArgs {
    fn into_config(self, strict: bool) -> BuildConfig {
        let mut builder = BuildConfig::builder();
        if let Some(name) = self.name {
            builder = builder.output_name(name);
        }
        if let Some(level) = self.api_level {
            builder = builder.api_level(level);
        }
        if let Some(path) = self.android_home {
            builder = builder.android_home(path);
        }
        if let Some(path) = self.java_home {
            builder = builder.java_home(path);
        }
        if let Some(path) = self.keystore {
            builder = builder.keystore(path);
        }
        if let Some(password) = self.storepass {
            builder = builder.keystore_password(password);
        }
        if let Some(alias) = self.alias {
            builder = builder.key_alias(alias);
        }
        if let Some(password) = self.keypass {
            builder = builder.key_password(password);
        }
        if let Some(secs) = self.timeout {
            builder = builder.tool_timeout(std::time::Duration::from_secs(secs));
        }
        builder.strict(strict).build()
    }
}

fn main() -> Result<()> {
    // Load .env before the environment is captured
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            in_place,
            output,
            remove_workspace,
            strict,
            config,
        } => {
            let options = commands::build::BuildOptions {
                input,
                in_place,
                output,
                remove_workspace,
            };
            commands::cmd_build(options, &config.into_config(strict))?;
        }

        Commands::Preflight { strict, config } => {
            commands::cmd_preflight(&config.into_config(false), strict)?;
        }

        Commands::Show { what, json, config } => {
            let target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Platforms => commands::show::ShowTarget::Platforms,
            };
            commands::cmd_show(target, &config.into_config(false), json)?;
        }
    }

    Ok(())
}
