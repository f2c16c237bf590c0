//! Android SDK and JDK discovery.
//!
//! [`platform`] finds the installed SDK platforms; [`resolver`] turns a
//! logical [`Tool`] into one absolute path on disk.

pub mod platform;
pub mod resolver;

pub use platform::{discover_platforms, select_platform, InstalledPlatform};
pub use resolver::{SdkResolver, Tool, ToolKind};
