//! `bazelext doctor` command

use anyhow::Result;

use bazelext::ops::{doctor, format_report};
use bazelext::util::{GlobalContext, Shell};

pub fn execute(ctx: &GlobalContext, shell: &Shell) -> Result<()> {
    // Doctor still runs outside a project; the workspace check reports it.
    let manifest = match ctx.load_manifest() {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::debug!("no manifest: {}", e);
            None
        }
    };
    let config = match &manifest {
        Some(m) => ctx.load_config(m.root()),
        None => ctx.load_config(ctx.cwd()),
    };

    let report = doctor(&config, manifest.as_ref());

    if shell.is_json() {
        shell.json_document(&report)?;
    } else {
        print!("{}", format_report(&report, shell.is_verbose()));
    }

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        std::process::exit(1);
    }

    Ok(())
}
