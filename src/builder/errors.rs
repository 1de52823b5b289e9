//! Build error types and diagnostics.

use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::target::TargetError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// The workspace descriptor could not be configured.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("marker `{marker}` not found in `{}`", .path.display())]
    MarkerNotFound { path: PathBuf, marker: String },

    #[error("marker `{marker}` matched {} lines in `{}`", .lines.len(), .path.display())]
    MarkerAmbiguous {
        path: PathBuf,
        marker: String,
        /// 1-based line numbers of every match.
        lines: Vec<usize>,
        /// Byte ranges of every matched line, for source-labelled reports.
        spans: Vec<Range<usize>>,
    },

    #[error("marker `{marker}` cannot be searched for: {message}")]
    InvalidMarker { marker: String, message: String },

    #[error("include directory `{value}` cannot be written into a quoted workspace value")]
    InvalidIncludeDir { value: String },

    #[error("failed to access workspace descriptor `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal error during an extension build run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("bazel build of `{target}` failed ({status})\n{output}")]
    BuildTool {
        target: String,
        /// Exit status, or the reason the tool never ran.
        status: String,
        /// Captured diagnostics, verbatim.
        output: String,
    },

    #[error("bazel reported success for `{target}` but `{}` does not exist", .path.display())]
    ArtifactMissing { target: String, path: PathBuf },

    #[error("filesystem error at `{}`", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl BuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::Configuration(ConfigurationError::MarkerNotFound { path, marker }) => {
                Diagnostic::error(format!("workspace marker not found in {}", path.display()))
                    .with_location(path)
                    .with_context(format!("expected a line like: path = \"...\",  {}", marker))
                    .with_suggestion(suggestions::ADD_MARKER)
            }

            BuildError::Configuration(ConfigurationError::MarkerAmbiguous {
                path,
                marker,
                lines,
                ..
            }) => {
                let mut diag = Diagnostic::error(format!(
                    "workspace marker `{}` is not unique",
                    marker
                ))
                .with_location(path);
                for line in lines {
                    diag = diag.with_context(format!("matched at line {}", line));
                }
                diag.with_suggestion(suggestions::UNIQUE_MARKER)
            }

            BuildError::Configuration(other) => Diagnostic::error(other.to_string()),

            BuildError::BuildTool { target, output, .. } => {
                let mut diag = Diagnostic::error(format!("bazel failed to build `{}`", target));
                for line in output.lines() {
                    diag = diag.with_context(line);
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }

            BuildError::ArtifactMissing { target, path } => Diagnostic::error(format!(
                "no artifact produced for `{}`",
                target
            ))
            .with_location(path)
            .with_suggestion(suggestions::CHECK_LINKSHARED),

            BuildError::Filesystem { path, source } => {
                Diagnostic::error(format!("cannot write {}", path.display()))
                    .with_context(source.to_string())
                    .with_suggestion(suggestions::CHECK_DISK)
            }

            BuildError::Target(e) => Diagnostic::error(e.to_string()),

            BuildError::InvalidTransition { .. } => Diagnostic::error(self.to_string()),
        }
    }
}
