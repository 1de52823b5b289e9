//! Package metadata scanned from plain text files.
//!
//! The packaging pipeline keeps its version in a source file
//! (`__version__ = "1.2.3"`) and its runtime requirements in a
//! newline-delimited list. Both are read with simple line scans.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::core::manifest::Manifest;
use crate::util::fs::read_to_string;

/// Metadata assembled for `bazelext metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: Option<String>,
    pub requirements: Vec<String>,
}

impl PackageMetadata {
    /// Read the files the manifest points at. Absent entries stay empty.
    pub fn load(manifest: &Manifest) -> Result<Self> {
        let version = manifest.version_file().map(read_version).transpose()?;
        let requirements = match manifest.requirements_file() {
            Some(path) => parse_requirements(path)?,
            None => Vec::new(),
        };

        Ok(PackageMetadata {
            name: manifest.package_name().to_string(),
            version,
            requirements,
        })
    }
}

/// Read the version string from the first line starting with `__version__`.
pub fn read_version(path: &Path) -> Result<String> {
    let content = read_to_string(path)?;
    parse_version(&content)
        .with_context(|| format!("failed to read version from {}", path.display()))
}

/// Parse the version out of file content.
pub fn parse_version(content: &str) -> Result<String> {
    let Some(line) = content.lines().find(|l| l.starts_with("__version__")) else {
        bail!("__version__ not defined");
    };

    let Some((_, value)) = line.split_once('=') else {
        bail!("malformed version line: `{}`", line);
    };

    let value = value.trim();
    let quote = match value.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => bail!("version must be a quoted string literal: `{}`", line),
    };

    let inner = &value[1..];
    match inner.find(quote) {
        Some(end) => Ok(inner[..end].to_string()),
        None => bail!("unterminated version string: `{}`", line),
    }
}

/// Read a requirements list.
pub fn parse_requirements(path: &Path) -> Result<Vec<String>> {
    let content = read_to_string(path)?;
    Ok(requirements_from_str(&content))
}

/// Keep every line that is neither blank nor a `#` comment, with trailing
/// whitespace removed.
pub fn requirements_from_str(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !(line.trim().is_empty() || line.starts_with('#')))
        .map(|line| line.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_version() {
        let content = "\"\"\"Docstring.\"\"\"\n\n__version__ = \"0.3.5\"\n__author__ = 'x'\n";
        assert_eq!(parse_version(content).unwrap(), "0.3.5");
    }

    #[test]
    fn test_parse_version_single_quotes_and_comment() {
        let content = "__version__ = '1.0.0rc1'  # bumped by release tooling\n";
        assert_eq!(parse_version(content).unwrap(), "1.0.0rc1");
    }

    #[test]
    fn test_parse_version_missing() {
        let err = parse_version("name = 'x'\n").unwrap_err();
        assert!(err.to_string().contains("__version__ not defined"));
    }

    #[test]
    fn test_parse_version_unquoted() {
        assert!(parse_version("__version__ = VERSION\n").is_err());
    }

    #[test]
    fn test_requirements_skip_comments_and_blanks() {
        let content = "# runtime deps\nprotobuf>=3.12   \n\n   \nnumpy\n#pinned\n";
        assert_eq!(requirements_from_str(content), vec!["protobuf>=3.12", "numpy"]);
    }

    #[test]
    fn test_read_files() {
        let tmp = TempDir::new().unwrap();
        let version = tmp.path().join("__init__.py");
        let reqs = tmp.path().join("requirements.txt");
        std::fs::write(&version, "__version__ = \"2.1.0\"\n").unwrap();
        std::fs::write(&reqs, "protobuf\n").unwrap();

        assert_eq!(read_version(&version).unwrap(), "2.1.0");
        assert_eq!(parse_requirements(&reqs).unwrap(), vec!["protobuf"]);
    }

    #[test]
    fn test_load_from_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        std::fs::write(tmp.path().join("pkg/__init__.py"), "__version__ = \"0.3.5\"\n").unwrap();
        std::fs::write(tmp.path().join("pkg/requirements.txt"), "absl-py\n# dev\n").unwrap();
        let manifest_path = tmp.path().join("Bazelext.toml");
        std::fs::write(
            &manifest_path,
            "[package]\nname = \"pkg\"\nversion-file = \"pkg/__init__.py\"\nrequirements = \"pkg/requirements.txt\"\n\n[[extension]]\nname = \"pkg\"\ntarget = \"//pkg:pkg\"\n",
        )
        .unwrap();

        let meta = PackageMetadata::load(&Manifest::load(&manifest_path).unwrap()).unwrap();
        assert_eq!(meta.name, "pkg");
        assert_eq!(meta.version.as_deref(), Some("0.3.5"));
        assert_eq!(meta.requirements, vec!["absl-py"]);
    }
}
