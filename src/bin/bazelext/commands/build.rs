//! `bazelext build` command

use anyhow::{anyhow, Result};

use crate::cli::BuildArgs;
use bazelext::builder::{BazelTool, BuildContext, BuildEvent};
use bazelext::core::{HostRuntime, Platform};
use bazelext::ops::{build_extensions, plan};
use bazelext::util::process::find_bazel;
use bazelext::util::shell::{format_duration, Status};
use bazelext::util::{GlobalContext, Shell};

pub fn execute(args: BuildArgs, ctx: &GlobalContext, shell: &Shell) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let config = ctx.load_config(manifest.root());

    let platform = Platform::host();
    if !args.library_dirs.is_empty() && !platform.needs_link_search_paths() {
        shell.warn("--library-dir is only passed to bazel on Windows, ignoring");
    }

    let build_ctx = BuildContext::resolve(
        &manifest,
        &config,
        args.overrides(),
        platform,
        || HostRuntime::detect(config.host.python.as_deref()),
    )?;

    if args.plan {
        return shell.json_document(&plan(&build_ctx, manifest.extensions()));
    }

    let bazel = find_bazel(config.bazel.program.as_deref()).ok_or_else(|| {
        anyhow!("bazel not found (set BAZEL, `[bazel] program`, or install bazel/bazelisk)")
    })?;
    let tool = BazelTool::new(bazel);

    let spinner = shell.spinner(
        Status::Building,
        format!(
            "{} extension(s) [{}]",
            manifest.extensions().len(),
            build_ctx.mode
        ),
    );

    let mut on_event = |event: &BuildEvent| {
        shell.json_event(event);
        match event {
            BuildEvent::WorkspaceConfigured {
                descriptor,
                include_dir,
                changed: true,
            } => spinner.suspend(|| {
                shell.status(
                    Status::Configured,
                    format!("{} -> {}", descriptor.display(), include_dir.display()),
                )
            }),
            BuildEvent::ExtensionBuilt {
                module,
                destination,
                ..
            } => spinner.suspend(|| {
                shell.status(
                    Status::Copied,
                    format!("{} -> {}", module, destination.display()),
                )
            }),
            _ => {}
        }
    };

    let result = build_extensions(&build_ctx, &tool, manifest.extensions(), &mut on_event);
    spinner.finish();
    let report = result?;

    shell.status(
        Status::Finished,
        format!(
            "{} extension(s) in {}",
            report.extensions.len(),
            format_duration(report.duration)
        ),
    );

    Ok(())
}
