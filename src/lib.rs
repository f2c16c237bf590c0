//! Builds signed, aligned Android packages from a workspace of inputs.
//!
//! The pieces, bottom-up:
//! - [`workspace`] - the per-build directory and its fixed layout
//! - [`sdk`] - installed platforms and tool lookup
//! - [`config`] - immutable build settings with cached SDK lookups
//! - [`process`] - running external tools with streamed output
//! - [`archive`] - patching entries into a package
//! - [`pipeline`] - the seven build stages
//! - [`preflight`] - a readable report of what the build will find

pub mod archive;
pub mod common;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod sdk;
pub mod timing;
pub mod workspace;

pub use config::{BuildConfig, BuildConfigBuilder, Environment};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Stage};
pub use process::{CancelToken, ProcessError};
pub use sdk::{InstalledPlatform, SdkResolver, Tool};
pub use workspace::{Entry, Seed, Workspace};
