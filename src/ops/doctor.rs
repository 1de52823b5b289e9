//! Environment health checks.
//!
//! The `doctor` command performs fast checks to verify that a build can
//! start: Bazel is runnable, the host runtime can be probed, and the
//! workspace descriptor carries exactly one marker line.
//!
//! ```bash
//! bazelext doctor           # Quick check
//! bazelext doctor --verbose # Detailed output
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::builder::workspace::locate_marker;
use crate::core::host::HostRuntime;
use crate::core::manifest::Manifest;
use crate::core::platform::Platform;
use crate::util::config::Config;
use crate::util::process::{combined_output, find_bazel, find_python, ProcessBuilder};

/// Result of a single health check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable status message
    pub message: String,

    /// Path to the tool or file (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Version string (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// How long the check took
    #[serde(skip)]
    pub duration: Duration,

    /// Whether this check is required or optional
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            passed: false,
            ..CheckResult::pass(name, message)
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,

    /// Total time taken
    #[serde(skip)]
    pub total_duration: Duration,

    /// Environment information
    pub environment: BTreeMap<String, String>,
}

impl DoctorReport {
    pub fn new() -> Self {
        DoctorReport::default()
    }

    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

/// Run every check.
///
/// `manifest` is `None` outside a project; the workspace check is then
/// reported as an optional failure.
pub fn doctor(config: &Config, manifest: Option<&Manifest>) -> DoctorReport {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    report
        .environment
        .insert("os".to_string(), std::env::consts::OS.to_string());
    report
        .environment
        .insert("arch".to_string(), std::env::consts::ARCH.to_string());

    report.add(check_bazel(config));

    let python_required = needs_host_probe(config, Platform::host());
    let python = check_python(config);
    report.add(if python_required { python } else { python.optional() });

    report.add(check_workspace(manifest));

    report.total_duration = start.elapsed();
    report
}

/// Whether a build would have to ask the interpreter for anything.
fn needs_host_probe(config: &Config, platform: Platform) -> bool {
    config.build.include_dir.is_none()
        || config.host.extension_suffix.is_none()
        || (platform.needs_link_search_paths() && config.build.library_dirs.is_empty())
}

fn check_bazel(config: &Config) -> CheckResult {
    let start = Instant::now();

    let Some(path) = find_bazel(config.bazel.program.as_deref()) else {
        return CheckResult::fail(
            "Bazel",
            "Bazel not found (set BAZEL, [bazel] program, or install bazel/bazelisk)",
        )
        .with_duration(start.elapsed());
    };

    match ProcessBuilder::new(&path).arg("--version").exec() {
        Ok(output) if output.status.success() => {
            let text = combined_output(&output);
            let version = text.lines().next().unwrap_or("").trim().to_string();
            CheckResult::pass("Bazel", "Bazel is available")
                .with_path(path)
                .with_version(version)
                .with_duration(start.elapsed())
        }
        Ok(output) => CheckResult::fail(
            "Bazel",
            format!("`{} --version` exited with {}", path.display(), output.status),
        )
        .with_path(path)
        .with_duration(start.elapsed()),
        Err(e) => CheckResult::fail("Bazel", format!("{:#}", e))
            .with_path(path)
            .with_duration(start.elapsed()),
    }
}

fn check_python(config: &Config) -> CheckResult {
    let start = Instant::now();

    let Some(path) = find_python(config.host.python.as_deref()) else {
        return CheckResult::fail(
            "Python",
            "No interpreter found (set PYTHON, [host] python, or install python3)",
        )
        .with_duration(start.elapsed());
    };

    match HostRuntime::probe(&path) {
        Ok(host) => {
            let message = match &host.include_dir {
                Some(dir) => format!("headers at {}", dir.display()),
                None => "interpreter did not report an include directory".to_string(),
            };
            let mut result = if host.include_dir.is_some() {
                CheckResult::pass("Python", message)
            } else {
                CheckResult::fail("Python", message)
            };
            if let Some(suffix) = host.ext_suffix {
                result = result.with_version(suffix);
            }
            result.with_path(path).with_duration(start.elapsed())
        }
        Err(e) => CheckResult::fail("Python", format!("probe failed: {:#}", e))
            .with_path(path)
            .with_duration(start.elapsed()),
    }
}

fn check_workspace(manifest: Option<&Manifest>) -> CheckResult {
    let start = Instant::now();

    let Some(manifest) = manifest else {
        return CheckResult::fail("Workspace", "no Bazelext.toml found")
            .optional()
            .with_duration(start.elapsed());
    };

    let path = manifest.descriptor_path().to_path_buf();
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            return CheckResult::fail("Workspace", format!("cannot read descriptor: {}", e))
                .with_path(path)
                .with_duration(start.elapsed())
        }
    };

    let result = match locate_marker(&path, &content, manifest.marker()) {
        Ok(found) => CheckResult::pass("Workspace", format!("marker on line {}", found.line)),
        Err(e) => CheckResult::fail("Workspace", e.to_string()),
    };
    result.with_path(path).with_duration(start.elapsed())
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    use std::fmt::Write;

    let mut output = String::new();

    let _ = writeln!(output, "bazelext doctor");
    let _ = writeln!(output, "===============\n");

    if verbose {
        let get = |key: &str| {
            report
                .environment
                .get(key)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string())
        };
        let _ = writeln!(output, "Environment:");
        let _ = writeln!(output, "  OS: {} ({})\n", get("os"), get("arch"));
    }

    let _ = writeln!(output, "Checks:");
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };

        let _ = writeln!(output, "  {} {}{}", status, check.name, required);

        if verbose || !check.passed {
            let _ = writeln!(output, "      {}", check.message);
        }
        if verbose {
            if let Some(path) = &check.path {
                let _ = writeln!(output, "      Path: {}", path.display());
            }
            if let Some(version) = &check.version {
                let _ = writeln!(output, "      Version: {}", version);
            }
        }
    }

    let _ = writeln!(output);

    let passed = report.passed_count();
    let failed = report.failed_count();
    let required_failed = report.required_failed_count();

    let _ = writeln!(output, "Summary: {} passed, {} failed", passed, failed);

    if required_failed > 0 {
        let _ = writeln!(
            output,
            "\n{} required check(s) failed. `bazelext build` will not succeed.",
            required_failed
        );
    } else if failed > 0 {
        let _ = writeln!(
            output,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        );
    } else {
        let _ = writeln!(output, "\nAll checks passed.");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::write_project;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_optional() {
        let result = CheckResult::fail("test", "missing").optional();
        assert!(!result.passed);
        assert!(!result.required);
    }

    #[test]
    fn test_doctor_report_optional_failed() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("required", "ok"));
        report.add(CheckResult::fail("optional", "missing").optional());

        assert!(report.all_required_passed());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.required_failed_count(), 0);
    }

    #[test]
    fn test_doctor_report_required_failed() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("check1", "ok"));
        report.add(CheckResult::fail("check2", "missing"));

        assert!(!report.all_required_passed());
        assert_eq!(report.required_failed_count(), 1);
        assert!(format_report(&report, false).contains("1 required check(s) failed"));
    }

    #[test]
    fn test_check_workspace_finds_marker() {
        let tmp = TempDir::new().unwrap();
        let manifest = Manifest::load(&write_project(tmp.path(), &[("ext", "//pkg:ext")])).unwrap();

        let result = check_workspace(Some(&manifest));
        assert!(result.passed, "{}", result.message);
        assert_eq!(result.message, "marker on line 4");
    }

    #[test]
    fn test_check_workspace_reports_missing_marker() {
        let tmp = TempDir::new().unwrap();
        let manifest = Manifest::load(&write_project(tmp.path(), &[("ext", "//pkg:ext")])).unwrap();
        std::fs::write(manifest.descriptor_path(), "workspace(name = \"x\")\n").unwrap();

        let result = check_workspace(Some(&manifest));
        assert!(!result.passed);
        assert!(result.required);
        assert!(result.message.contains("not found"));
    }

    #[test]
    fn test_check_workspace_without_manifest_is_optional() {
        let result = check_workspace(None);
        assert!(!result.passed);
        assert!(!result.required);
    }

    #[test]
    fn test_host_probe_needed_for_windows_library_dirs() {
        let mut config = Config::default();
        assert!(needs_host_probe(&config, Platform::Unix));

        config.build.include_dir = Some(PathBuf::from("/opt/python/include"));
        config.host.extension_suffix = Some(".pyd".to_string());
        assert!(!needs_host_probe(&config, Platform::Unix));
        assert!(needs_host_probe(&config, Platform::Windows));

        config.build.library_dirs = vec![PathBuf::from("C:/Python311/libs")];
        assert!(!needs_host_probe(&config, Platform::Windows));
    }

    #[test]
    fn test_missing_bazel_program() {
        let mut config = Config::default();
        config.bazel.program = Some(PathBuf::from("definitely-not-bazel-for-tests"));

        // Only meaningful where neither BAZEL nor a real bazel is around.
        if std::env::var_os("BAZEL").is_none()
            && which::which("bazel").is_err()
            && which::which("bazelisk").is_err()
        {
            assert!(!check_bazel(&config).passed);
        }
    }
}
