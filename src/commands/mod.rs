//! CLI command handlers.
//!
//! - `build` - build a package from a project directory
//! - `preflight` - report on SDK, JDK and keystore
//! - `show` - display configuration and platforms

pub mod build;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
