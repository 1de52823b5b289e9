//! Test fixtures for common test scenarios.

use std::path::{Path, PathBuf};

/// A WORKSPACE whose include-path line (line 4) carries `include`.
pub fn workspace_content(include: &str) -> String {
    format!(
        r#"workspace(name = "demo")

new_local_repository(
    path = "{include}",  # May be overwritten by setup.py.
    name = "python_headers",
    build_file = "//third_party:python_headers.BUILD",
)
"#
    )
}

/// Write [`workspace_content`] to `dir/WORKSPACE`.
pub fn write_workspace(dir: &Path, include: &str) -> PathBuf {
    let path = dir.join("WORKSPACE");
    std::fs::write(&path, workspace_content(include)).unwrap();
    path
}

/// A manifest declaring one extension per `(module, label)` pair.
pub fn manifest_content(name: &str, extensions: &[(&str, &str)]) -> String {
    let mut content = format!("[package]\nname = \"{name}\"\n");
    for (module, label) in extensions {
        content.push_str(&format!(
            "\n[[extension]]\nname = \"{module}\"\ntarget = \"{label}\"\n"
        ));
    }
    content
}

/// Lay out a buildable project: `Bazelext.toml` plus `WORKSPACE`.
///
/// Returns the manifest path.
pub fn write_project(dir: &Path, extensions: &[(&str, &str)]) -> PathBuf {
    write_workspace(dir, "/placeholder/include");
    let manifest = dir.join("Bazelext.toml");
    std::fs::write(&manifest, manifest_content("demo", extensions)).unwrap();
    manifest
}
