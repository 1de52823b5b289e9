//! Native extension targets.
//!
//! An extension pairs the importable module name with the Bazel label that
//! produces it, e.g. `psi_cardinality` built by
//! `//psi_cardinality/python:psi_cardinality`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Error constructing an [`ExtensionTarget`] from a label.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("extension module name must not be empty")]
    EmptyModuleName,

    #[error("invalid module name `{0}`: expected dotted identifier like `pkg.module`")]
    InvalidModuleName(String),

    #[error("target `{0}` must be an absolute label starting with `//`")]
    NotAbsolute(String),

    #[error("target `{0}` has no `:` separating package path and target name")]
    MissingSeparator(String),

    #[error("target `{0}` has more than one `:` separator")]
    AmbiguousSeparator(String),

    #[error("target `{0}` has an empty target name")]
    EmptyTargetName(String),
}

/// One requested native extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionTarget {
    module_name: String,
    target_id: String,
    relative_path: String,
    target_name: String,
}

impl ExtensionTarget {
    /// Create a target from a module name and a `//path:name` label.
    pub fn new(module_name: impl Into<String>, target_id: impl Into<String>) -> Result<Self, TargetError> {
        let module_name = module_name.into();
        let target_id = target_id.into();

        validate_module_name(&module_name)?;

        let rest = target_id
            .strip_prefix("//")
            .ok_or_else(|| TargetError::NotAbsolute(target_id.clone()))?;

        let mut parts = rest.split(':');
        let (relative_path, target_name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(path), Some(name), None) => (path, name),
            (_, None, _) => return Err(TargetError::MissingSeparator(target_id)),
            _ => return Err(TargetError::AmbiguousSeparator(target_id)),
        };

        if target_name.is_empty() {
            return Err(TargetError::EmptyTargetName(target_id));
        }

        Ok(ExtensionTarget {
            module_name,
            relative_path: relative_path.trim_end_matches('/').to_string(),
            target_name: target_name.to_string(),
            target_id,
        })
    }

    /// Importable module name (dotted).
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Full Bazel label, as declared.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Package path inside the Bazel workspace, `/`-separated. Empty for
    /// the root package.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Name part of the label.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Package path as a host path.
    pub fn relative_dir(&self) -> PathBuf {
        self.relative_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Where the packaging pipeline expects the compiled module: the dotted
    /// module name becomes nested directories under `build_lib`.
    pub fn destination(&self, build_lib: &Path, ext_suffix: &str) -> PathBuf {
        let mut segments: Vec<&str> = self.module_name.split('.').collect();
        let file_stem = segments.pop().unwrap_or(&self.module_name);

        let mut dest = build_lib.to_path_buf();
        for segment in segments {
            dest.push(segment);
        }
        dest.push(format!("{}{}", file_stem, ext_suffix));
        dest
    }
}

impl fmt::Display for ExtensionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.module_name, self.target_id)
    }
}

fn validate_module_name(name: &str) -> Result<(), TargetError> {
    if name.is_empty() {
        return Err(TargetError::EmptyModuleName);
    }

    let valid = name.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                chars.all(|c| c.is_alphanumeric() || c == '_')
            }
            _ => false,
        }
    });

    if valid {
        Ok(())
    } else {
        Err(TargetError::InvalidModuleName(name.to_string()))
    }
}
