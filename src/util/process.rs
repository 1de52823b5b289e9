//! Subprocess execution and tool lookup.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Builder for a blocking subprocess with captured output.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Only a failure to spawn or wait is an error here; the exit status is
    /// left for the caller to judge.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!("running `{}`", self.display_command());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Stdout followed by stderr, lossily decoded. Bazel writes nearly all of its
/// diagnostics to stderr, so both streams are kept.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a tool from an environment variable, an explicit setting, or a
/// list of PATH candidates, in that order.
fn find_tool(env_var: &str, configured: Option<&Path>, candidates: &[&str]) -> Option<PathBuf> {
    if let Ok(value) = std::env::var(env_var) {
        if let Some(path) = find_executable(&value) {
            return Some(path);
        }
        tracing::warn!("{}={} does not name an executable, ignoring", env_var, value);
    }

    if let Some(configured) = configured {
        if let Some(path) = find_executable(&configured.to_string_lossy()) {
            return Some(path);
        }
        tracing::warn!(
            "configured program {} not found, falling back to PATH",
            configured.display()
        );
    }

    candidates.iter().find_map(|name| find_executable(name))
}

/// Find Bazel: `BAZEL`, then the configured program, then `bazel` or
/// `bazelisk` on PATH.
pub fn find_bazel(configured: Option<&Path>) -> Option<PathBuf> {
    find_tool("BAZEL", configured, &["bazel", "bazelisk"])
}

/// Find the host Python interpreter: `PYTHON`, then the configured program,
/// then `python3` or `python` on PATH.
pub fn find_python(configured: Option<&Path>) -> Option<PathBuf> {
    find_tool("PYTHON", configured, &["python3", "python"])
}
