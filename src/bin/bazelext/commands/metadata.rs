//! `bazelext metadata` command

use anyhow::Result;

use bazelext::core::PackageMetadata;
use bazelext::util::{GlobalContext, Shell};

pub fn execute(ctx: &GlobalContext, shell: &Shell) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let metadata = PackageMetadata::load(&manifest)?;

    if shell.is_json() {
        return shell.json_document(&metadata);
    }

    shell.print(format!("name: {}", metadata.name));
    shell.print(format!(
        "version: {}",
        metadata.version.as_deref().unwrap_or("(unset)")
    ));
    if metadata.requirements.is_empty() {
        shell.print("requirements: (none)");
    } else {
        shell.print("requirements:");
        for req in &metadata.requirements {
            shell.print(format!("  {}", req));
        }
    }

    Ok(())
}
