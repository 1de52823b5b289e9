//! Bazel invocation.
//!
//! Argument assembly is kept separate from execution so the exact argv can
//! be inspected (and printed by `bazelext build --plan`) without running a
//! compiler.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::process::{combined_output, ProcessBuilder};

/// Prefix for Bazel's convenience symlinks, relative to the output root.
pub const SYMLINK_PREFIX: &str = "bazel-";

/// Debug or optimized build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilationMode {
    Dbg,
    #[default]
    Opt,
}

impl CompilationMode {
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            CompilationMode::Dbg
        } else {
            CompilationMode::Opt
        }
    }

    /// Value of Bazel's `--compilation_mode` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilationMode::Dbg => "dbg",
            CompilationMode::Opt => "opt",
        }
    }
}

impl fmt::Display for CompilationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `bazel build` call.
#[derive(Debug, Clone, Serialize)]
pub struct BazelInvocation {
    pub target_id: String,
    pub output_root: PathBuf,
    pub mode: CompilationMode,
    /// Import library directories; only used on Windows.
    pub extra_link_dirs: Vec<PathBuf>,
    /// Extra flags from configuration, appended verbatim.
    pub extra_args: Vec<String>,
}

impl BazelInvocation {
    pub fn new(target_id: impl Into<String>, output_root: impl Into<PathBuf>, debug: bool) -> Self {
        BazelInvocation {
            target_id: target_id.into(),
            output_root: output_root.into(),
            mode: CompilationMode::from_debug(debug),
            extra_link_dirs: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    pub fn link_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.extra_link_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `--symlink_prefix` value. Rooting the prefix under the output root keeps
    /// builds for different output roots from sharing `bazel-bin`.
    pub fn symlink_prefix(&self) -> PathBuf {
        self.output_root.join(SYMLINK_PREFIX)
    }

    /// The argv passed to Bazel, program name excluded.
    pub fn args(&self, platform: Platform) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            self.target_id.clone(),
            format!("--symlink_prefix={}", self.symlink_prefix().display()),
            format!("--compilation_mode={}", self.mode),
        ];

        // Link against the runtime's import library (python3x.lib).
        if platform.needs_link_search_paths() {
            for dir in &self.extra_link_dirs {
                args.push(format!("--linkopt=/LIBPATH:{}", dir.display()));
            }
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Captured result of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub output: String,
}

/// Something that can execute a Bazel argv.
pub trait BuildTool {
    /// Human-readable tool name for logs.
    fn name(&self) -> String;

    /// Run the tool to completion. Must fail with [`BuildError::BuildTool`]
    /// when the tool cannot start or exits non-zero.
    fn run(&self, target_id: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, BuildError>;
}

/// The real Bazel binary.
#[derive(Debug, Clone)]
pub struct BazelTool {
    program: PathBuf,
}

impl BazelTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        BazelTool {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl BuildTool for BazelTool {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    fn run(&self, target_id: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, BuildError> {
        let cmd = ProcessBuilder::new(&self.program).args(args).cwd(cwd);

        let output = cmd.exec().map_err(|e| BuildError::BuildTool {
            target: target_id.to_string(),
            status: "failed to launch".to_string(),
            output: format!("{:#}", e),
        })?;

        let text = combined_output(&output);
        if !output.status.success() {
            return Err(BuildError::BuildTool {
                target: target_id.to_string(),
                status: output.status.to_string(),
                output: text,
            });
        }

        Ok(ToolOutput { output: text })
    }
}

/// Runs invocations through a [`BuildTool`] for one platform.
pub struct BuildInvoker<'a> {
    tool: &'a dyn BuildTool,
    platform: Platform,
    workspace_root: PathBuf,
}

impl<'a> BuildInvoker<'a> {
    pub fn new(tool: &'a dyn BuildTool, platform: Platform, workspace_root: impl Into<PathBuf>) -> Self {
        BuildInvoker {
            tool,
            platform,
            workspace_root: workspace_root.into(),
        }
    }

    /// Run Bazel for `invocation`, blocking until it exits.
    pub fn invoke(&self, invocation: &BazelInvocation) -> Result<ToolOutput, BuildError> {
        let args = invocation.args(self.platform);

        tracing::info!(
            "building {} ({})",
            invocation.target_id,
            invocation.mode
        );
        tracing::debug!("{} {}", self.tool.name(), args.join(" "));

        let output = self
            .tool
            .run(&invocation.target_id, &args, &self.workspace_root)?;

        tracing::debug!("bazel output:\n{}", output.output);
        Ok(output)
    }
}

impl fmt::Debug for BuildInvoker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildInvoker")
            .field("tool", &self.tool.name())
            .field("platform", &self.platform)
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTool;

    #[test]
    fn test_args_opt_unix() {
        let inv = BazelInvocation::new("//pkg:ext", "/tmp/out", false);
        let args = inv.args(Platform::Unix);

        assert_eq!(args[0], "build");
        assert_eq!(args[1], "//pkg:ext");
        assert_eq!(
            args[2],
            format!("--symlink_prefix={}", Path::new("/tmp/out").join("bazel-").display())
        );
        assert_eq!(args[3], "--compilation_mode=opt");
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_args_debug_mode() {
        let inv = BazelInvocation::new("//pkg:ext", "out", true);
        assert!(inv.args(Platform::Unix).contains(&"--compilation_mode=dbg".to_string()));
        assert!(!inv.args(Platform::Unix).contains(&"--compilation_mode=opt".to_string()));
    }

    #[test]
    fn test_link_dirs_on_windows_in_order() {
        let inv = BazelInvocation::new("//pkg:ext", "out", false)
            .link_dirs(["C:/Python311/libs", "D:/extra"]);
        let args = inv.args(Platform::Windows);

        let link: Vec<_> = args.iter().filter(|a| a.starts_with("--linkopt=")).collect();
        assert_eq!(
            link,
            vec!["--linkopt=/LIBPATH:C:/Python311/libs", "--linkopt=/LIBPATH:D:/extra"]
        );
    }

    #[test]
    fn test_no_link_dirs_off_windows() {
        let inv = BazelInvocation::new("//pkg:ext", "out", false)
            .link_dirs(["/usr/lib", "/opt/lib"]);
        let args = inv.args(Platform::Unix);

        assert!(!args.iter().any(|a| a.starts_with("--linkopt=")));
    }

    #[test]
    fn test_extra_args_appended_last() {
        let inv = BazelInvocation::new("//pkg:ext", "out", false)
            .link_dirs(["C:/libs"])
            .extra_args(["--config=ci", "--jobs=4"]);
        let args = inv.args(Platform::Windows);

        assert_eq!(&args[args.len() - 2..], &["--config=ci", "--jobs=4"]);
    }

    #[test]
    fn test_invoke_passes_args_to_tool() {
        let tool = RecordingTool::new();
        let invoker = BuildInvoker::new(&tool, Platform::Unix, "/ws");
        let inv = BazelInvocation::new("//pkg:ext", "/out", false);

        invoker.invoke(&inv).unwrap();

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], inv.args(Platform::Unix));
    }

    #[test]
    fn test_invoke_surfaces_tool_failure() {
        let tool = RecordingTool::new().fail_with("ERROR: compilation failed");
        let invoker = BuildInvoker::new(&tool, Platform::Unix, "/ws");

        let err = invoker
            .invoke(&BazelInvocation::new("//pkg:ext", "/out", false))
            .unwrap_err();

        match err {
            BuildError::BuildTool { target, output, .. } => {
                assert_eq!(target, "//pkg:ext");
                assert_eq!(output, "ERROR: compilation failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_bazel_tool_nonzero_exit() {
        let tool = BazelTool::new("sh");
        let args = vec!["-c".to_string(), "echo 'ERROR: boom' >&2; exit 1".to_string()];

        let err = tool.run("//pkg:ext", &args, Path::new(".")).unwrap_err();
        match err {
            BuildError::BuildTool { output, status, .. } => {
                assert!(output.contains("ERROR: boom"));
                assert!(status.contains('1'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bazel_tool_missing_program() {
        let tool = BazelTool::new("no-such-bazel-binary-for-tests");
        let err = tool.run("//pkg:ext", &[], Path::new(".")).unwrap_err();
        assert!(matches!(err, BuildError::BuildTool { ref status, .. } if status == "failed to launch"));
    }
}
