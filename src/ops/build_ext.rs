//! Implementation of `bazelext build`.
//!
//! One run patches the workspace descriptor once, then builds and copies
//! each extension in declaration order. The descriptor stays locked for the
//! whole run so a concurrent run on the same workspace cannot rewrite the
//! include path between our configure step and our Bazel invocations.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::builder::context::BuildContext;
use crate::builder::errors::BuildError;
use crate::builder::events::BuildEvent;
use crate::builder::invoker::{BazelInvocation, BuildInvoker, BuildTool};
use crate::builder::relocate::{self, ArtifactLocation};
use crate::builder::workspace::{WorkspaceConfigurator, WorkspaceDescriptor};
use crate::core::target::ExtensionTarget;

/// Where a run is.
///
/// ```text
/// Unconfigured -> Configured -> Built -> Relocated -> Done
///                     |           ^          |
///                     |           +----------+   (next target)
///                     +-> Done                   (no targets)
/// any state -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildState {
    Unconfigured,
    Configured,
    Built,
    Relocated,
    Done,
    Failed,
}

impl BuildState {
    /// Whether `self -> next` is an edge of the run graph.
    pub fn can_transition_to(self, next: BuildState) -> bool {
        use BuildState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Unconfigured, Configured)
            | (Configured, Built)
            | (Built, Relocated)
            | (Relocated, Built)
            | (Relocated, Done)
            | (Configured, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Unconfigured => "unconfigured",
            BuildState::Configured => "configured",
            BuildState::Built => "built",
            BuildState::Relocated => "relocated",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One extension that made it into the packaging tree.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltExtension {
    pub module: String,
    pub target: String,
    #[serde(flatten)]
    pub location: ArtifactLocation,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Whether the descriptor had to be rewritten
    pub workspace_changed: bool,
    pub extensions: Vec<BuiltExtension>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Planned work for one extension, for `build --plan`.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedExtension {
    pub module: String,
    pub target: String,
    /// Bazel argv, program excluded
    pub args: Vec<String>,
    #[serde(flatten)]
    pub location: ArtifactLocation,
}

/// Sequences configure, invoke and relocate for a list of extensions.
pub struct BuildOrchestrator<'a> {
    ctx: &'a BuildContext,
    tool: &'a dyn BuildTool,
    state: BuildState,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(ctx: &'a BuildContext, tool: &'a dyn BuildTool) -> Self {
        BuildOrchestrator {
            ctx,
            tool,
            state: BuildState::Unconfigured,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Run every extension. The first error ends the run in
    /// [`BuildState::Failed`]; artifacts already copied stay in place.
    ///
    /// A finished orchestrator rejects a second run without emitting any
    /// events.
    pub fn run(
        &mut self,
        extensions: &[ExtensionTarget],
        on_event: &mut dyn FnMut(&BuildEvent),
    ) -> Result<BuildReport, BuildError> {
        self.check(BuildState::Configured)?;

        let start = Instant::now();
        let mut built = Vec::with_capacity(extensions.len());

        on_event(&BuildEvent::started(
            self.ctx.mode.as_str(),
            self.ctx.platform.to_string(),
            extensions.len(),
        ));

        let result = self.run_inner(extensions, &mut built, on_event);
        let duration = start.elapsed();

        on_event(&BuildEvent::finished(
            result.is_ok(),
            duration.as_millis() as u64,
            built.len(),
        ));

        match result {
            Ok(workspace_changed) => Ok(BuildReport {
                workspace_changed,
                extensions: built,
                duration,
            }),
            Err(e) => {
                tracing::debug!("run failed in state {}: {}", self.state, e);
                if !self.state.is_terminal() {
                    self.state = BuildState::Failed;
                }
                Err(e)
            }
        }
    }

    fn run_inner(
        &mut self,
        extensions: &[ExtensionTarget],
        built: &mut Vec<BuiltExtension>,
        on_event: &mut dyn FnMut(&BuildEvent),
    ) -> Result<bool, BuildError> {
        let ctx = self.ctx;

        // Held until this function returns, on every path.
        let mut descriptor = WorkspaceDescriptor::open(&ctx.descriptor)?;
        let changed = WorkspaceConfigurator::new(ctx.marker.clone())
            .configure_descriptor(&mut descriptor, &ctx.include_dir)?;
        self.transition(BuildState::Configured)?;

        tracing::info!(
            "{} include path {}",
            if changed { "set" } else { "kept" },
            ctx.include_dir.display()
        );
        on_event(&BuildEvent::WorkspaceConfigured {
            descriptor: ctx.descriptor.clone(),
            include_dir: ctx.include_dir.clone(),
            changed,
        });

        std::fs::create_dir_all(&ctx.output_root).map_err(|source| BuildError::Filesystem {
            path: ctx.output_root.clone(),
            source,
        })?;

        let invoker = BuildInvoker::new(self.tool, ctx.platform, &ctx.workspace_root);

        for ext in extensions {
            invoker.invoke(&invocation_for(ctx, ext))?;
            self.transition(BuildState::Built)?;

            let location = relocate::relocate(
                &ctx.output_root,
                ext.relative_path(),
                ext.target_name(),
                &ext.destination(&ctx.build_lib, &ctx.ext_suffix),
                ctx.platform,
            )?;
            self.transition(BuildState::Relocated)?;

            tracing::info!(
                "{} -> {}",
                ext.target_id(),
                location.destination.display()
            );
            on_event(&BuildEvent::ExtensionBuilt {
                module: ext.module_name().to_string(),
                target: ext.target_id().to_string(),
                artifact: location.source.clone(),
                destination: location.destination.clone(),
            });

            built.push(BuiltExtension {
                module: ext.module_name().to_string(),
                target: ext.target_id().to_string(),
                location,
            });
        }

        self.transition(BuildState::Done)?;

        drop(descriptor);
        Ok(changed)
    }

    fn check(&self, next: BuildState) -> Result<(), BuildError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(BuildError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            })
        }
    }

    fn transition(&mut self, next: BuildState) -> Result<(), BuildError> {
        self.check(next)?;
        tracing::trace!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

fn invocation_for(ctx: &BuildContext, ext: &ExtensionTarget) -> BazelInvocation {
    BazelInvocation::new(ext.target_id(), &ctx.output_root, ctx.is_debug())
        .link_dirs(ctx.library_dirs.iter().cloned())
        .extra_args(ctx.extra_args.iter().cloned())
}

/// What a run would do, without touching the workspace or running Bazel.
pub fn plan(ctx: &BuildContext, extensions: &[ExtensionTarget]) -> Vec<PlannedExtension> {
    extensions
        .iter()
        .map(|ext| PlannedExtension {
            module: ext.module_name().to_string(),
            target: ext.target_id().to_string(),
            args: invocation_for(ctx, ext).args(ctx.platform),
            location: relocate::locate(
                ext,
                &ctx.output_root,
                &ctx.build_lib,
                &ctx.ext_suffix,
                ctx.platform,
            ),
        })
        .collect()
}

/// Build every extension with a fresh orchestrator.
pub fn build_extensions(
    ctx: &BuildContext,
    tool: &dyn BuildTool,
    extensions: &[ExtensionTarget],
    on_event: &mut dyn FnMut(&BuildEvent),
) -> Result<BuildReport, BuildError> {
    BuildOrchestrator::new(ctx, tool).run(extensions, on_event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::invoker::CompilationMode;
    use crate::core::platform::Platform;
    use crate::test_support::fixtures::{workspace_content, write_workspace};
    use crate::test_support::{RecordingTool, ARTIFACT_BYTES};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn context(root: &Path) -> BuildContext {
        let descriptor = write_workspace(root, "/old/include");
        BuildContext {
            platform: Platform::Unix,
            workspace_root: root.to_path_buf(),
            descriptor,
            marker: crate::core::manifest::DEFAULT_MARKER.to_string(),
            output_root: root.join("build").join("temp"),
            build_lib: root.join("build").join("lib"),
            mode: CompilationMode::Opt,
            include_dir: PathBuf::from("/usr/include/python3.11"),
            library_dirs: Vec::new(),
            ext_suffix: ".so".to_string(),
            extra_args: Vec::new(),
        }
    }

    fn targets() -> Vec<ExtensionTarget> {
        vec![
            ExtensionTarget::new("pkg.first", "//pkg:first").unwrap(),
            ExtensionTarget::new("second", "//other/dir:second").unwrap(),
        ]
    }

    #[test]
    fn test_state_graph() {
        use BuildState::*;

        assert!(Unconfigured.can_transition_to(Configured));
        assert!(Configured.can_transition_to(Built));
        assert!(Built.can_transition_to(Relocated));
        assert!(Relocated.can_transition_to(Built));
        assert!(Relocated.can_transition_to(Done));
        assert!(Built.can_transition_to(Failed));

        assert!(!Unconfigured.can_transition_to(Built));
        assert!(!Built.can_transition_to(Done));
        assert!(!Done.can_transition_to(Built));
        assert!(!Failed.can_transition_to(Configured));
        assert!(Failed.is_terminal());
    }

    #[test]
    fn test_run_builds_and_places_every_extension() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);

        let mut events = Vec::new();
        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        let report = orchestrator
            .run(&targets(), &mut |e| events.push(e.to_json()))
            .unwrap();

        assert_eq!(orchestrator.state(), BuildState::Done);
        assert!(report.workspace_changed);
        assert_eq!(tool.built_targets(), vec!["//pkg:first", "//other/dir:second"]);

        let first = ctx.build_lib.join("pkg").join("first.so");
        let second = ctx.build_lib.join("second.so");
        assert_eq!(std::fs::read(&first).unwrap(), ARTIFACT_BYTES);
        assert_eq!(std::fs::read(&second).unwrap(), ARTIFACT_BYTES);
        let placed: Vec<_> = report
            .extensions
            .iter()
            .map(|e| e.location.destination.clone())
            .collect();
        assert_eq!(placed, vec![first, second]);

        assert_eq!(
            std::fs::read_to_string(&ctx.descriptor).unwrap(),
            workspace_content("/usr/include/python3.11")
        );

        assert!(events[0].contains("build-started"));
        assert!(events[1].contains("workspace-configured"));
        assert_eq!(events.iter().filter(|e| e.contains("extension-built")).count(), 2);
        assert!(events.last().unwrap().contains("\"success\":true"));
    }

    #[test]
    fn test_output_root_created_before_first_build() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        assert!(!ctx.output_root.exists());

        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);
        build_extensions(&ctx, &tool, &targets()[..1], &mut |_| {}).unwrap();

        assert!(ctx.output_root.is_dir());
    }

    #[test]
    fn test_configure_happens_once_per_run() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);

        let mut configured = 0;
        build_extensions(&ctx, &tool, &targets(), &mut |e| {
            if matches!(e, BuildEvent::WorkspaceConfigured { .. }) {
                configured += 1;
            }
        })
        .unwrap();
        assert_eq!(configured, 1);

        // Second run: same include dir, nothing to rewrite.
        let report = build_extensions(&ctx, &tool, &targets(), &mut |_| {}).unwrap();
        assert!(!report.workspace_changed);
    }

    #[test]
    fn test_failure_aborts_remaining_targets() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new()
            .produce_artifacts(Platform::Unix)
            .fail_on("//pkg:first", "ERROR: pkg/BUILD:1:1: compile failed");

        let mut finished = None;
        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        let err = orchestrator
            .run(&targets(), &mut |e| {
                if let BuildEvent::BuildFinished { success, .. } = e {
                    finished = Some(*success);
                }
            })
            .unwrap_err();

        assert!(matches!(err, BuildError::BuildTool { ref output, .. } if output.contains("compile failed")));
        assert_eq!(orchestrator.state(), BuildState::Failed);
        assert_eq!(tool.built_targets(), vec!["//pkg:first"]);
        assert_eq!(finished, Some(false));
        assert!(!ctx.build_lib.join("second.so").exists());
    }

    #[test]
    fn test_placed_artifacts_survive_later_failure() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new()
            .produce_artifacts(Platform::Unix)
            .fail_on("//other/dir:second", "ERROR: link failed");

        let err = build_extensions(&ctx, &tool, &targets(), &mut |_| {}).unwrap_err();

        assert!(matches!(err, BuildError::BuildTool { .. }));
        // No rollback.
        assert!(ctx.build_lib.join("pkg").join("first.so").exists());
    }

    #[test]
    fn test_zero_exit_without_artifact_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new();

        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        let err = orchestrator.run(&targets(), &mut |_| {}).unwrap_err();

        match err {
            BuildError::ArtifactMissing { target, path } => {
                assert_eq!(target, "//pkg:first");
                assert_eq!(path, ctx.output_root.join("bazel-bin").join("pkg").join("_first.so"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(orchestrator.state(), BuildState::Failed);
        assert_eq!(tool.calls().len(), 1);
    }

    #[test]
    fn test_configuration_error_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        std::fs::write(&ctx.descriptor, "workspace(name = \"demo\")\n").unwrap();
        let tool = RecordingTool::new();

        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        let err = orchestrator.run(&targets(), &mut |_| {}).unwrap_err();

        assert!(matches!(err, BuildError::Configuration(_)));
        assert_eq!(orchestrator.state(), BuildState::Failed);
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn test_finished_run_cannot_be_reused() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);

        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        orchestrator.run(&targets(), &mut |_| {}).unwrap();

        let mut events = Vec::new();
        let err = orchestrator
            .run(&targets(), &mut |e| events.push(e.to_json()))
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidTransition { .. }));
        assert_eq!(orchestrator.state(), BuildState::Done);
        assert_eq!(tool.calls().len(), 2);
        assert!(events.is_empty(), "{:?}", events);
    }

    #[test]
    fn test_empty_run_configures_and_finishes() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let tool = RecordingTool::new();

        let mut orchestrator = BuildOrchestrator::new(&ctx, &tool);
        let report = orchestrator.run(&[], &mut |_| {}).unwrap();

        assert!(report.extensions.is_empty());
        assert!(report.workspace_changed);
        assert_eq!(orchestrator.state(), BuildState::Done);
    }

    #[test]
    fn test_plan_matches_run() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(tmp.path());
        ctx.extra_args = vec!["--config=ci".to_string()];

        let planned = plan(&ctx, &targets());
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].args[1], "//pkg:first");
        assert_eq!(planned[0].args.last().unwrap(), "--config=ci");
        assert_eq!(planned[1].location.destination, ctx.build_lib.join("second.so"));

        // Planning touches nothing.
        assert_eq!(
            std::fs::read_to_string(&ctx.descriptor).unwrap(),
            workspace_content("/old/include")
        );

        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);
        build_extensions(&ctx, &tool, &targets(), &mut |_| {}).unwrap();
        let calls = tool.calls();
        assert_eq!(calls[0], planned[0].args);
        assert_eq!(calls[1], planned[1].args);
    }

    #[test]
    fn test_debug_mode_reaches_bazel() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(tmp.path());
        ctx.mode = CompilationMode::Dbg;
        let tool = RecordingTool::new().produce_artifacts(Platform::Unix);

        build_extensions(&ctx, &tool, &targets()[..1], &mut |_| {}).unwrap();
        assert!(tool.calls()[0].contains(&"--compilation_mode=dbg".to_string()));
    }
}
