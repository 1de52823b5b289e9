//! Host platform capability.
//!
//! Bazel output naming and link flags differ only between Windows and
//! everything else, so the whole crate keys off a single value resolved once
//! at the start of a build and threaded down to every component.

use std::fmt;

use serde::Serialize;

/// Platform family the extension is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Windows: `.dll` artifacts, explicit import-library search paths.
    Windows,
    /// Linux, macOS and the BSDs: `.so` artifacts, no extra link flags.
    Unix,
}

impl Platform {
    /// Detect the platform this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Build a platform from a plain "is Windows" flag.
    pub fn from_is_windows(is_windows: bool) -> Self {
        if is_windows {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Suffix Bazel gives to a `cc_binary(linkshared = True)` output.
    pub fn shared_lib_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".dll",
            Platform::Unix => ".so",
        }
    }

    /// Whether the linker needs explicit search paths for the host runtime's
    /// import libraries.
    pub fn needs_link_search_paths(&self) -> bool {
        self.is_windows()
    }

    /// Fallback suffix for the installed extension module when the host
    /// runtime was not probed and none is configured.
    pub fn default_extension_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".pyd",
            Platform::Unix => ".so",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Unix => write!(f, "unix"),
        }
    }
}
