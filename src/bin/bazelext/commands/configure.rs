//! `bazelext configure` command
//!
//! Runs only the workspace step of a build: rewrites the marker line so
//! Bazel sees the host runtime headers.

use anyhow::{anyhow, Result};

use crate::cli::ConfigureArgs;
use bazelext::builder::{BuildError, BuildEvent, WorkspaceConfigurator};
use bazelext::core::HostRuntime;
use bazelext::util::shell::Status;
use bazelext::util::{GlobalContext, Shell};

pub fn execute(args: ConfigureArgs, ctx: &GlobalContext, shell: &Shell) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let config = ctx.load_config(manifest.root());

    let include_dir = match args.include_dir.or(config.build.include_dir) {
        Some(dir) => dir,
        None => HostRuntime::detect(config.host.python.as_deref())?
            .include_dir
            .ok_or_else(|| anyhow!("host runtime did not report an include directory (pass --include-dir)"))?,
    };

    let descriptor = manifest.descriptor_path();
    let changed = WorkspaceConfigurator::new(manifest.marker())
        .configure(descriptor, &include_dir)
        .map_err(BuildError::from)?;

    shell.json_event(&BuildEvent::WorkspaceConfigured {
        descriptor: descriptor.to_path_buf(),
        include_dir: include_dir.clone(),
        changed,
    });

    if changed {
        shell.status(
            Status::Configured,
            format!("{} -> {}", descriptor.display(), include_dir.display()),
        );
    } else {
        shell.status(Status::Skipped, format!("{} is up to date", descriptor.display()));
    }

    Ok(())
}
