//! Configuration file support for bazelext.
//!
//! bazelext supports two configuration file locations:
//! - Global: `~/.bazelext/config.toml` - User-wide defaults
//! - Project: `.bazelext/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config; command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory name used for both config locations.
pub const CONFIG_DIR: &str = ".bazelext";

/// bazelext configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bazel settings
    pub bazel: BazelConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Host runtime settings
    pub host: HostConfig,
}

/// How Bazel is run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BazelConfig {
    /// Bazel or Bazelisk executable (name or path)
    pub program: Option<PathBuf>,

    /// Flags appended to every `bazel build`, e.g. `--config=ci`
    pub extra_args: Vec<String>,
}

/// Defaults for `bazelext build`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Build with `--compilation_mode=dbg`
    pub debug: Option<bool>,

    /// Where Bazel's `bazel-*` symlinks go
    pub output_root: Option<PathBuf>,

    /// Root of the packaging tree that receives built modules
    pub build_lib: Option<PathBuf>,

    /// Import library directories (Windows only)
    pub library_dirs: Vec<PathBuf>,

    /// Host runtime header directory
    pub include_dir: Option<PathBuf>,
}

/// Host runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HostConfig {
    /// Interpreter used to probe include/library paths
    pub python: Option<PathBuf>,

    /// Suffix for installed extension modules, e.g. `.abi3.so`
    pub extension_suffix: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Lists are replaced, not concatenated.
    pub fn merge(&mut self, other: Config) {
        // Bazel settings
        if other.bazel.program.is_some() {
            self.bazel.program = other.bazel.program;
        }
        if !other.bazel.extra_args.is_empty() {
            self.bazel.extra_args = other.bazel.extra_args;
        }

        // Build settings
        if other.build.debug.is_some() {
            self.build.debug = other.build.debug;
        }
        if other.build.output_root.is_some() {
            self.build.output_root = other.build.output_root;
        }
        if other.build.build_lib.is_some() {
            self.build.build_lib = other.build.build_lib;
        }
        if !other.build.library_dirs.is_empty() {
            self.build.library_dirs = other.build.library_dirs;
        }
        if other.build.include_dir.is_some() {
            self.build.include_dir = other.build.include_dir;
        }

        // Host settings
        if other.host.python.is_some() {
            self.host.python = other.host.python;
        }
        if other.host.extension_suffix.is_some() {
            self.host.extension_suffix = other.host.extension_suffix;
        }
    }

    /// Make relative paths in this config relative to `base`.
    ///
    /// Bare program names like `bazelisk` are left alone so they are still
    /// looked up on PATH.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        if let Some(p) = self.build.output_root.as_mut() {
            join(p);
        }
        if let Some(p) = self.build.build_lib.as_mut() {
            join(p);
        }
        if let Some(p) = self.build.include_dir.as_mut() {
            join(p);
        }
        self.build.library_dirs.iter_mut().for_each(join);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.bazelext/config.toml)
/// 2. Global config (~/.bazelext/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    // Project config overrides global. Its relative paths are relative to
    // the project root, i.e. the parent of `.bazelext/`.
    if project_path.exists() {
        let mut project = Config::load_or_default(project_path);
        if let Some(root) = project_path.parent().and_then(Path::parent) {
            project.resolve_paths(root);
        }
        config.merge(project);
    }

    config
}

/// Get the global bazelext config directory (~/.bazelext).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR))
}

/// Get the project config path (.bazelext/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join("config.toml")
}
