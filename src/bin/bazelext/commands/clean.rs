//! `bazelext clean` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::CleanArgs;
use bazelext::builder::context::DEFAULT_OUTPUT_ROOT;
use bazelext::util::fs::{remove_dir_all_if_exists, resolve_against};
use bazelext::util::shell::Status;
use bazelext::util::{GlobalContext, Shell};

pub fn execute(args: CleanArgs, ctx: &GlobalContext, shell: &Shell) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let config = ctx.load_config(manifest.root());

    let output_root = args
        .output_root
        .or(config.build.output_root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));
    let output_root = resolve_against(manifest.root(), &output_root);

    if output_root.exists() {
        remove_dir_all_if_exists(&output_root)?;
        shell.status(Status::Removed, output_root.display());
    } else {
        shell.status(Status::Skipped, format!("{} does not exist", output_root.display()));
    }

    Ok(())
}
