//! Moving Bazel outputs to where the packaging pipeline expects them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::errors::BuildError;
use crate::core::platform::Platform;
use crate::core::target::ExtensionTarget;

/// Directory under the output root where Bazel's `bin` symlink lands.
pub const BAZEL_BIN: &str = "bazel-bin";

/// Source and destination of one relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactLocation {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// `output_root/bazel-bin/<relative_path>/_<target_name><suffix>`.
///
/// `relative_path` is the `/`-separated package path of the label; an empty
/// path is the root package.
pub fn artifact_path(
    output_root: &Path,
    relative_path: &str,
    target_name: &str,
    platform: Platform,
) -> PathBuf {
    let mut path = output_root.join(BAZEL_BIN);
    for segment in relative_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.push(format!("_{}{}", target_name, platform.shared_lib_suffix()));
    path
}

/// Where `target` is built and where it goes.
pub fn locate(
    target: &ExtensionTarget,
    output_root: &Path,
    build_lib: &Path,
    ext_suffix: &str,
    platform: Platform,
) -> ArtifactLocation {
    ArtifactLocation {
        source: artifact_path(
            output_root,
            target.relative_path(),
            target.target_name(),
            platform,
        ),
        destination: target.destination(build_lib, ext_suffix),
    }
}

/// Copy the built artifact to `destination`, replacing whatever is there.
pub fn relocate(
    output_root: &Path,
    relative_path: &str,
    target_name: &str,
    destination: &Path,
    platform: Platform,
) -> Result<ArtifactLocation, BuildError> {
    let source = artifact_path(output_root, relative_path, target_name, platform);

    if !source.is_file() {
        return Err(BuildError::ArtifactMissing {
            target: format!("//{}:{}", relative_path, target_name),
            path: source,
        });
    }

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Filesystem {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // `bazel-bin` is a symlink into Bazel's output base; fs::copy follows
    // it and writes a regular file.
    let bytes = std::fs::copy(&source, destination).map_err(|source| BuildError::Filesystem {
        path: destination.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "copied {} -> {} ({} bytes)",
        source.display(),
        destination.display(),
        bytes
    );

    Ok(ArtifactLocation {
        source,
        destination: destination.to_path_buf(),
    })
}
