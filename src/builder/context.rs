//! Build context - paths, host runtime and Bazel settings for one run.
//!
//! Every value is resolved up front, from command-line overrides, then
//! configuration, then the host runtime probe, so a run never discovers a
//! missing input halfway through its targets.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::builder::invoker::CompilationMode;
use crate::core::host::HostRuntime;
use crate::core::manifest::Manifest;
use crate::core::platform::Platform;
use crate::util::config::Config;
use crate::util::fs::resolve_against;

/// Default output root, relative to the workspace root.
pub const DEFAULT_OUTPUT_ROOT: &str = "build/temp";

/// Default destination root, relative to the workspace root.
pub const DEFAULT_BUILD_LIB: &str = "build/lib";

/// Command-line overrides for a build. Unset fields fall back to config.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub debug: bool,
    pub library_dirs: Vec<PathBuf>,
    pub include_dir: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub build_lib: Option<PathBuf>,
}

/// Fully resolved inputs for one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildContext {
    /// Host platform family
    pub platform: Platform,

    /// Bazel workspace root (where Bazel runs)
    pub workspace_root: PathBuf,

    /// Workspace descriptor to patch
    pub descriptor: PathBuf,

    /// Marker comment in the descriptor
    pub marker: String,

    /// Root for Bazel's `bazel-*` symlinks
    pub output_root: PathBuf,

    /// Root of the packaging tree
    pub build_lib: PathBuf,

    /// dbg or opt
    pub mode: CompilationMode,

    /// Host runtime headers
    pub include_dir: PathBuf,

    /// Import library directories (only passed to Bazel on Windows)
    pub library_dirs: Vec<PathBuf>,

    /// Suffix of installed extension modules
    pub ext_suffix: String,

    /// Extra flags for every `bazel build`
    pub extra_args: Vec<String>,
}

impl BuildContext {
    /// Resolve a context for `manifest`.
    ///
    /// `probe` is called at most once, and only if some value is still
    /// missing after overrides and config.
    pub fn resolve<F>(
        manifest: &Manifest,
        config: &Config,
        overrides: BuildOverrides,
        platform: Platform,
        probe: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<HostRuntime>,
    {
        let root = manifest.root();
        let in_root = |p: PathBuf| resolve_against(root, &p);

        let include_dir = overrides
            .include_dir
            .or_else(|| config.build.include_dir.clone());
        let mut library_dirs = if overrides.library_dirs.is_empty() {
            config.build.library_dirs.clone()
        } else {
            overrides.library_dirs
        };
        let ext_suffix = config.host.extension_suffix.clone();

        let needs_libs = platform.needs_link_search_paths() && library_dirs.is_empty();
        let needs_probe = include_dir.is_none() || needs_libs || ext_suffix.is_none();

        let (host, probe_error) = if needs_probe {
            match probe() {
                Ok(host) => (host, None),
                Err(e) => (HostRuntime::default(), Some(format!("{:#}", e))),
            }
        } else {
            (HostRuntime::default(), None)
        };

        let missing = |what: &str, flag: &str| match &probe_error {
            Some(e) => anyhow!(
                "no {} given ({}) and the host runtime probe failed: {}",
                what,
                flag,
                e
            ),
            None => anyhow!(
                "no {} given ({}) and the host runtime did not report one",
                what,
                flag
            ),
        };

        let include_dir = include_dir
            .or(host.include_dir)
            .ok_or_else(|| missing("include directory", "--include-dir"))?;

        if needs_libs {
            let dir = host
                .library_dir
                .ok_or_else(|| missing("library directory", "--library-dir"))?;
            library_dirs.push(dir);
        }

        let ext_suffix = match ext_suffix.or(host.ext_suffix) {
            Some(suffix) => suffix,
            None => {
                let fallback = platform.default_extension_suffix();
                if let Some(e) = &probe_error {
                    tracing::warn!("host runtime probe failed ({}), using `{}` suffix", e, fallback);
                }
                fallback.to_string()
            }
        };

        let debug = overrides.debug || config.build.debug.unwrap_or(false);

        Ok(BuildContext {
            platform,
            workspace_root: root.to_path_buf(),
            descriptor: manifest.descriptor_path().to_path_buf(),
            marker: manifest.marker().to_string(),
            output_root: in_root(
                overrides
                    .output_root
                    .or_else(|| config.build.output_root.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            ),
            build_lib: in_root(
                overrides
                    .build_lib
                    .or_else(|| config.build.build_lib.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_LIB)),
            ),
            mode: CompilationMode::from_debug(debug),
            include_dir,
            library_dirs,
            ext_suffix,
            extra_args: config.bazel.extra_args.clone(),
        })
    }

    pub fn is_debug(&self) -> bool {
        self.mode == CompilationMode::Dbg
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}
