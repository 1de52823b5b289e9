//! Host runtime discovery.
//!
//! The extension links against the Python runtime that will import it. Its
//! header directory goes into the Bazel workspace, and on Windows its import
//! library directory goes onto the linker search path.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::Serialize;

use crate::util::process::{combined_output, find_python, ProcessBuilder};

/// Printed by the interpreter, one `key=value` per line.
const PROBE_SCRIPT: &str = r#"import os, sys, sysconfig
print("include=" + sysconfig.get_paths()["include"])
if sys.platform.startswith("win"):
    print("libdir=" + os.path.join(sys.exec_prefix, "libs"))
else:
    print("libdir=" + (sysconfig.get_config_var("LIBDIR") or ""))
print("ext_suffix=" + (sysconfig.get_config_var("EXT_SUFFIX") or ""))
"#;

/// Paths reported by the host runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostRuntime {
    /// Header directory (`Python.h`).
    pub include_dir: Option<PathBuf>,
    /// Import library / shared library directory.
    pub library_dir: Option<PathBuf>,
    /// Suffix of an importable extension module, e.g.
    /// `.cpython-311-x86_64-linux-gnu.so`.
    pub ext_suffix: Option<String>,
}

impl HostRuntime {
    /// Find the interpreter (see [`find_python`]) and probe it.
    pub fn detect(configured: Option<&Path>) -> Result<Self> {
        let interpreter = find_python(configured).ok_or_else(|| {
            anyhow!("no Python interpreter found (set PYTHON, `[host] python`, or install python3)")
        })?;
        Self::probe(&interpreter)
    }

    /// Ask `interpreter` for its paths.
    pub fn probe(interpreter: &Path) -> Result<Self> {
        let output = ProcessBuilder::new(interpreter)
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .exec()?;

        if !output.status.success() {
            bail!(
                "`{} -c <probe>` exited with {}:\n{}",
                interpreter.display(),
                output.status,
                combined_output(&output)
            );
        }

        let runtime = Self::parse(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!("host runtime: {:?}", runtime);
        Ok(runtime)
    }

    /// Parse probe output. Unknown keys and empty values are ignored.
    pub fn parse(text: &str) -> Self {
        let mut runtime = HostRuntime::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "include" => runtime.include_dir = Some(PathBuf::from(value)),
                "libdir" => runtime.library_dir = Some(PathBuf::from(value)),
                "ext_suffix" => runtime.ext_suffix = Some(value.to_string()),
                _ => {}
            }
        }

        runtime
    }
}
