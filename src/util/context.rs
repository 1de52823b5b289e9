//! Global context for bazelext operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{find_manifest, Manifest, ManifestError};
use crate::util::config::{global_config_dir, load_config, project_config_path, Config, CONFIG_DIR};

/// Process-wide settings shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Global config directory (~/.bazelext)
    home: PathBuf,

    /// Explicit `--manifest-path`
    manifest_path: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new global context.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(CONFIG_DIR));

        Ok(GlobalContext {
            cwd,
            home,
            manifest_path: None,
        })
    }

    /// Create with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Use this manifest instead of searching upward from the cwd.
    pub fn set_manifest_path(&mut self, path: Option<PathBuf>) {
        self.manifest_path = path.map(|p| self.cwd.join(p));
    }

    /// Override the global config directory.
    pub fn set_home(&mut self, home: PathBuf) {
        self.home = home;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Global config file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Locate the manifest: `--manifest-path` if given, else the nearest
    /// `Bazelext.toml` at or above the cwd.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        match &self.manifest_path {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(ManifestError::NotFound {
                dir: path.parent().unwrap_or(path).to_path_buf(),
            }),
            None => find_manifest(&self.cwd),
        }
    }

    /// Find and load the manifest.
    pub fn load_manifest(&self) -> Result<Manifest, ManifestError> {
        let path = self.find_manifest()?;
        tracing::debug!("using manifest {}", path.display());
        Manifest::load(&path)
    }

    /// Global config merged with the project's `.bazelext/config.toml`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        load_config(&self.config_path(), &project_config_path(project_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::write_project;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.home().to_string_lossy().contains("bazelext"));
    }

    #[test]
    fn test_find_manifest() {
        let tmp = TempDir::new().unwrap();
        let manifest = write_project(tmp.path(), &[("ext", "//pkg:ext")]);

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.find_manifest().ok(), Some(manifest));
    }

    #[test]
    fn test_explicit_manifest_path() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        write_project(&project, &[("ext", "//pkg:ext")]);

        let mut ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        ctx.set_manifest_path(Some(PathBuf::from("proj/Bazelext.toml")));

        let manifest = ctx.load_manifest().unwrap();
        assert_eq!(manifest.root(), project);
    }

    #[test]
    fn test_explicit_manifest_path_missing() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        ctx.set_manifest_path(Some(PathBuf::from("nope/Bazelext.toml")));

        assert!(matches!(
            ctx.find_manifest(),
            Err(ManifestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_config_uses_home() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join("config.toml"), "[bazel]\nprogram = \"bazelisk\"\n").unwrap();

        let mut ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        ctx.set_home(home);

        let config = ctx.load_config(tmp.path());
        assert_eq!(config.bazel.program, Some(PathBuf::from("bazelisk")));
    }
}
