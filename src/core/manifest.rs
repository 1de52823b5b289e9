//! `Bazelext.toml` manifest parsing and schema.
//!
//! The manifest lives at the root of the Bazel workspace and declares the
//! package being assembled, where its workspace descriptor is, and which
//! Bazel targets produce its native extension modules.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::core::target::{ExtensionTarget, TargetError};

/// Manifest file name.
pub const MANIFEST_NAME: &str = "Bazelext.toml";

/// Default workspace descriptor file name.
pub const DEFAULT_DESCRIPTOR: &str = "WORKSPACE";

/// Comment that tags the include-path line in the workspace descriptor.
pub const DEFAULT_MARKER: &str = "# May be overwritten by setup.py.";

/// Error loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `Bazelext.toml` in `{}` or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },

    #[error("failed to read manifest `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest `{}`", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid extension #{index} in `{}`", .path.display())]
    InvalidExtension {
        path: PathBuf,
        index: usize,
        #[source]
        source: TargetError,
    },

    #[error("manifest `{}` declares no [[extension]] entries", .path.display())]
    NoExtensions { path: PathBuf },

    #[error("extension module `{name}` is declared more than once")]
    DuplicateExtension { name: String },

    #[error("workspace marker must not be empty")]
    EmptyMarker,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    package: RawPackage,
    #[serde(default)]
    workspace: RawWorkspace,
    #[serde(default, rename = "extension")]
    extensions: Vec<RawExtension>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawPackage {
    name: String,
    version_file: Option<PathBuf>,
    requirements: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspace {
    descriptor: Option<PathBuf>,
    marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExtension {
    name: String,
    target: String,
}

/// A loaded, validated manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    root: PathBuf,
    package_name: String,
    version_file: Option<PathBuf>,
    requirements: Option<PathBuf>,
    descriptor: PathBuf,
    marker: String,
    extensions: Vec<ExtensionTarget>,
}

impl Manifest {
    /// Load and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content, path)
    }

    /// Parse manifest content read from `path`.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        if raw.extensions.is_empty() {
            return Err(ManifestError::NoExtensions {
                path: path.to_path_buf(),
            });
        }

        let mut extensions: Vec<ExtensionTarget> = Vec::with_capacity(raw.extensions.len());
        for (index, ext) in raw.extensions.into_iter().enumerate() {
            let target = ExtensionTarget::new(ext.name, ext.target).map_err(|source| {
                ManifestError::InvalidExtension {
                    path: path.to_path_buf(),
                    index: index + 1,
                    source,
                }
            })?;

            if extensions.iter().any(|e| e.module_name() == target.module_name()) {
                return Err(ManifestError::DuplicateExtension {
                    name: target.module_name().to_string(),
                });
            }
            extensions.push(target);
        }

        let marker = raw.workspace.marker.unwrap_or_else(|| DEFAULT_MARKER.to_string());
        if marker.trim().is_empty() {
            return Err(ManifestError::EmptyMarker);
        }

        Ok(Manifest {
            package_name: raw.package.name,
            version_file: raw.package.version_file.map(|p| root.join(p)),
            requirements: raw.package.requirements.map(|p| root.join(p)),
            descriptor: root.join(
                raw.workspace
                    .descriptor
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DESCRIPTOR)),
            ),
            marker,
            extensions,
            root,
        })
    }

    /// Directory containing the manifest (the Bazel workspace root).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn version_file(&self) -> Option<&Path> {
        self.version_file.as_deref()
    }

    pub fn requirements_file(&self) -> Option<&Path> {
        self.requirements.as_deref()
    }

    /// Absolute path of the workspace descriptor.
    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor
    }

    /// Marker comment identifying the include-path line.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Declared extensions, in declaration order.
    pub fn extensions(&self) -> &[ExtensionTarget] {
        &self.extensions
    }
}

/// Find the manifest in `dir` or any ancestor.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    dir.ancestors()
        .map(|d| d.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ManifestError::NotFound {
            dir: dir.to_path_buf(),
        })
}
