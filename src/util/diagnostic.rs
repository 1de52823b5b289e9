//! User-friendly diagnostic messages.
//!
//! Every build failure is reported with its root cause, the relevant
//! external-tool output, and a suggested fix.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// No manifest in the directory tree.
    pub const NO_MANIFEST: &str =
        "Create a `Bazelext.toml` next to your Bazel WORKSPACE file";

    /// Marker line missing from the workspace descriptor.
    pub const ADD_MARKER: &str =
        "Tag the host include path in your WORKSPACE with the marker comment, or set `[workspace] marker` in Bazelext.toml";

    /// Marker matched several lines.
    pub const UNIQUE_MARKER: &str =
        "Keep the marker comment on exactly one line of the WORKSPACE file";

    /// Bazel exited non-zero.
    pub const BUILD_FAILED: &str = "Fix the error reported by bazel above and re-run `bazelext build`";

    /// Bazel exited zero without the expected output.
    pub const CHECK_LINKSHARED: &str =
        "Check that the target is a `cc_binary` with `linkshared = True` named `_<target>`";

    /// Copy or mkdir failed.
    pub const CHECK_DISK: &str = "Check permissions and free space at the destination";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m".to_string(),
            (false, severity) => severity.to_string(),
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  | {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Ambiguous workspace marker, rendered against the descriptor source.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("workspace marker `{marker}` is not unique")]
#[diagnostic(
    code(bazelext::workspace::ambiguous_marker),
    help("Keep the marker comment on exactly one line of the WORKSPACE file")
)]
pub struct AmbiguousMarkerReport {
    pub marker: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label(collection, "marker matched here")]
    pub spans: Vec<SourceSpan>,
}

impl AmbiguousMarkerReport {
    pub fn new(name: impl AsRef<str>, content: String, marker: &str, spans: &[Range<usize>]) -> Self {
        AmbiguousMarkerReport {
            marker: marker.to_string(),
            src: NamedSource::new(name, content),
            spans: spans.iter().map(|r| SourceSpan::from(r.clone())).collect(),
        }
    }
}
