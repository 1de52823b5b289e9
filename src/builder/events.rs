//! Build event types for JSON output.
//!
//! These events are emitted one JSON object per line when using
//! `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: a run began
//! - `workspace-configured`: the descriptor now points at the host headers
//! - `extension-built`: one extension was built and copied into place
//! - `build-finished`: the run completed (success or failure)
//!
//! New fields may be added; existing fields are not removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

/// A build event emitted during an extension build run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Bazel compilation mode ("dbg" or "opt")
        mode: String,
        /// "windows" or "unix"
        platform: String,
        /// Number of extensions requested
        extension_count: usize,
    },

    #[serde(rename = "workspace-configured")]
    WorkspaceConfigured {
        descriptor: PathBuf,
        include_dir: PathBuf,
        /// False when the descriptor already held this path
        changed: bool,
    },

    #[serde(rename = "extension-built")]
    ExtensionBuilt {
        /// Dotted module name
        module: String,
        /// Bazel label
        target: String,
        /// Path under `bazel-bin`
        artifact: PathBuf,
        /// Where the module was copied
        destination: PathBuf,
    },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Total run duration in milliseconds
        duration_ms: u64,
        /// Extensions placed before the run ended
        extensions_built: usize,
    },
}

impl BuildEvent {
    /// Create a build started event.
    pub fn started(mode: impl Into<String>, platform: impl Into<String>, extension_count: usize) -> Self {
        BuildEvent::BuildStarted {
            mode: mode.into(),
            platform: platform.into(),
            extension_count,
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64, extensions_built: usize) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            extensions_built,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
