//! Test utilities and mocks for unit tests.
//!
//! [`RecordingTool`] stands in for Bazel: it records every argv it is
//! handed and, like Bazel, can drop the linked output under the
//! `--symlink_prefix` tree so relocation has something to copy.
//!
//! ```rust,ignore
//! let tool = RecordingTool::new().produce_artifacts(Platform::Unix);
//! let report = build_extensions(&ctx, &tool, &targets, &mut |_| {})?;
//! assert_eq!(tool.calls().len(), 2);
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::builder::errors::BuildError;
use crate::builder::invoker::{BuildTool, ToolOutput};
use crate::core::platform::Platform;
use crate::core::target::ExtensionTarget;

pub use fixtures::*;

/// Bytes written into every fake artifact.
pub const ARTIFACT_BYTES: &[u8] = b"\x7fELF\x00fake extension\xff\xfe";

/// Mock [`BuildTool`] that records calls.
#[derive(Debug, Default)]
pub struct RecordingTool {
    calls: Mutex<Vec<Vec<String>>>,
    /// Produce artifacts with this platform's suffix on success.
    artifacts: Option<Platform>,
    /// Fail every call with this output.
    fail_all: Option<String>,
    /// Fail only this target, with this output.
    fail_target: Option<(String, String)>,
}

impl RecordingTool {
    pub fn new() -> Self {
        RecordingTool::default()
    }

    pub fn produce_artifacts(mut self, platform: Platform) -> Self {
        self.artifacts = Some(platform);
        self
    }

    pub fn fail_with(mut self, output: impl Into<String>) -> Self {
        self.fail_all = Some(output.into());
        self
    }

    pub fn fail_on(mut self, target_id: impl Into<String>, output: impl Into<String>) -> Self {
        self.fail_target = Some((target_id.into(), output.into()));
        self
    }

    /// Every argv passed to [`BuildTool::run`], in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Labels that were built, in call order.
    pub fn built_targets(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|args| args.get(1).cloned())
            .collect()
    }

    fn write_artifact(&self, platform: Platform, target_id: &str, args: &[String]) {
        let prefix = args
            .iter()
            .find_map(|a| a.strip_prefix("--symlink_prefix="))
            .expect("invocation without --symlink_prefix");
        let target = ExtensionTarget::new("mock", target_id).unwrap();

        let dir: PathBuf = Path::new(&format!("{}bin", prefix)).join(target.relative_dir());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!(
                "_{}{}",
                target.target_name(),
                platform.shared_lib_suffix()
            )),
            ARTIFACT_BYTES,
        )
        .unwrap();
    }
}

impl BuildTool for RecordingTool {
    fn name(&self) -> String {
        "mock-bazel".to_string()
    }

    fn run(&self, target_id: &str, args: &[String], _cwd: &Path) -> Result<ToolOutput, BuildError> {
        self.calls.lock().unwrap().push(args.to_vec());

        let failure = match (&self.fail_all, &self.fail_target) {
            (Some(output), _) => Some(output.clone()),
            (None, Some((target, output))) if target == target_id => Some(output.clone()),
            _ => None,
        };
        if let Some(output) = failure {
            return Err(BuildError::BuildTool {
                target: target_id.to_string(),
                status: "exit status: 1".to_string(),
                output,
            });
        }

        if let Some(platform) = self.artifacts {
            self.write_artifact(platform, target_id, args);
        }

        Ok(ToolOutput {
            output: format!("INFO: Build completed successfully for {}", target_id),
        })
    }
}
