//! Error types for the build library.
//!
//! Every public operation returns [`Result`]. Stage failures are wrapped in
//! [`Error::Stage`] so callers always learn which step broke, what was run
//! and what the tool printed.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;
use crate::process::ProcessError;
use crate::sdk::Tool;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All failures raised by the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable configuration (no SDK root, no installed platform, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every candidate location for a tool was probed and none exists.
    #[error("could not find tool '{tool}' (tried: {})", join_paths(.tried))]
    ToolNotFound { tool: Tool, tried: Vec<PathBuf> },

    /// Workspace allocation, layout or seeding failed.
    #[error("workspace error at {}: {reason}", .path.display())]
    Resource { path: PathBuf, reason: String },

    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A container could not be read or written.
    #[error("archive error in {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Pre-flight validation of a tool or file failed.
    #[error("{subject} \"{}\" {reason}", .path.display())]
    Validation {
        subject: String,
        path: PathBuf,
        reason: String,
    },

    /// A stage was started before its predecessor produced its output.
    #[error("stage '{stage}' is missing required input {}", .path.display())]
    MissingInput { stage: Stage, path: PathBuf },

    /// A stage finished but its declared output is not on disk.
    #[error("stage '{stage}' did not produce {}", .path.display())]
    MissingOutput { stage: Stage, path: PathBuf },

    /// External command failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Failure of a single pipeline stage.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// The stage this error belongs to, if it was raised by the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. }
            | Self::MissingInput { stage, .. }
            | Self::MissingOutput { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Command line (passwords redacted) that was being run, if any.
    pub fn command_line(&self) -> Option<&str> {
        match self {
            Self::Process(err) => Some(err.command_line()),
            Self::Stage { source, .. } => source.command_line(),
            _ => None,
        }
    }

    /// Merged stdout/stderr captured from the failing tool, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Process(err) => err.output(),
            Self::Stage { source, .. } => source.output(),
            _ => None,
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_lists_every_path() {
        let err = Error::ToolNotFound {
            tool: Tool::Aapt,
            tried: vec![PathBuf::from("/a/aapt"), PathBuf::from("/b/aapt")],
        };
        let msg = err.to_string();
        assert!(msg.contains("'aapt'"));
        assert!(msg.contains("/a/aapt, /b/aapt"));
    }

    #[test]
    fn test_stage_accessors_walk_wrapped_errors() {
        let inner = ProcessError::Exit {
            command: "dx --dex".to_string(),
            code: Some(2),
            output: "bad class".to_string(),
        };
        let err = Error::Stage {
            stage: Stage::DexCompile,
            source: Box::new(Error::Process(inner)),
        };
        assert_eq!(err.stage(), Some(Stage::DexCompile));
        assert_eq!(err.command_line(), Some("dx --dex"));
        assert_eq!(err.output(), Some("bad class"));
    }
}
