//! Bazel workspace descriptor patching.
//!
//! The `WORKSPACE` file declares the host runtime headers as a local
//! repository whose path differs per machine:
//!
//! ```text
//! new_local_repository(
//!     name = "python_headers",
//!     path = "/usr/include/python3.11",  # May be overwritten by setup.py.
//!     build_file = "//third_party:python_headers.BUILD",
//! )
//! ```
//!
//! Only the quoted value in front of the marker comment is rewritten. The
//! marker itself is never touched, so configuring twice with the same
//! directory leaves the file byte-identical.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use regex::Regex;

use crate::builder::errors::ConfigurationError;
use crate::core::manifest::DEFAULT_MARKER;

/// The single located marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    /// 1-based line number.
    pub line: usize,
    /// Byte range of the quoted value, quotes excluded.
    pub value: Range<usize>,
}

/// Exclusive handle on a workspace descriptor.
///
/// Opening takes an advisory lock that is held until the handle is dropped,
/// so two builds sharing one workspace run one after the other. Edits are
/// made in memory and written through the same handle by [`commit`].
///
/// [`commit`]: WorkspaceDescriptor::commit
#[derive(Debug)]
pub struct WorkspaceDescriptor {
    path: PathBuf,
    file: File,
    content: String,
    /// Bytes currently on disk, restored if a commit fails midway.
    on_disk: String,
    dirty: bool,
}

impl WorkspaceDescriptor {
    /// Open and lock the descriptor, blocking while another run holds it.
    pub fn open(path: &Path) -> Result<Self, ConfigurationError> {
        let io_err = |source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        if file.try_lock_exclusive().is_err() {
            tracing::warn!(
                "waiting for another build to release {}",
                path.display()
            );
            file.lock_exclusive().map_err(io_err)?;
        }

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(io_err)?;

        Ok(WorkspaceDescriptor {
            path: path.to_path_buf(),
            file,
            on_disk: content.clone(),
            content,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory content, including uncommitted edits.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Find the one line carrying `marker` after a quoted value.
    pub fn locate(&self, marker: &str) -> Result<MarkerMatch, ConfigurationError> {
        locate_marker(&self.path, &self.content, marker)
    }

    /// Replace the marked value with `include_dir`, forward-slashed.
    ///
    /// Returns whether the content changed.
    pub fn set_include_dir(
        &mut self,
        marker: &str,
        include_dir: &Path,
    ) -> Result<bool, ConfigurationError> {
        let value = normalize_include_dir(include_dir)?;
        let found = self.locate(marker)?;

        if self.content[found.value.clone()] == value {
            tracing::debug!(
                "{}:{} already points at {}",
                self.path.display(),
                found.line,
                value
            );
            return Ok(false);
        }

        tracing::debug!("{}:{} -> {}", self.path.display(), found.line, value);
        self.content.replace_range(found.value, &value);
        self.dirty = true;
        Ok(true)
    }

    /// Write pending edits back in place and flush them to disk.
    ///
    /// If the write fails, the previous content is written back through the
    /// same handle before the error is returned.
    ///
    /// Returns whether anything was written.
    pub fn commit(&mut self) -> Result<bool, ConfigurationError> {
        if !self.dirty {
            return Ok(false);
        }

        rewrite(
            &mut self.file,
            &self.path,
            self.content.as_bytes(),
            self.on_disk.as_bytes(),
        )
        .map_err(|source| ConfigurationError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.on_disk.clone_from(&self.content);
        self.dirty = false;
        Ok(true)
    }
}

/// A seekable file whose length can be set and that can be synced.
trait Rewritable: Write + Seek {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl Rewritable for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Replace the whole content of `file` with `content`, falling back to
/// `previous` on error.
fn rewrite<F: Rewritable>(
    file: &mut F,
    path: &Path,
    content: &[u8],
    previous: &[u8],
) -> io::Result<()> {
    let Err(err) = overwrite(file, content) else {
        return Ok(());
    };

    match overwrite(file, previous) {
        Ok(()) => tracing::warn!("restored {} after failed write", path.display()),
        Err(e) => tracing::error!(
            "failed to restore {} after failed write: {}",
            path.display(),
            e
        ),
    }
    Err(err)
}

/// Write from the start, then cut the file to the written length. The
/// original bytes stay in place until they are overwritten.
fn overwrite<F: Rewritable>(file: &mut F, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.set_len(bytes.len() as u64)?;
    file.sync()
}

impl Drop for WorkspaceDescriptor {
    fn drop(&mut self) {
        if self.dirty {
            tracing::warn!(
                "discarding uncommitted edits to {}",
                self.path.display()
            );
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Patches the workspace descriptor for one marker.
#[derive(Debug, Clone)]
pub struct WorkspaceConfigurator {
    marker: String,
}

impl WorkspaceConfigurator {
    pub fn new(marker: impl Into<String>) -> Self {
        WorkspaceConfigurator {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Open, patch, and commit the descriptor at `workspace_path`.
    ///
    /// Returns whether the file changed.
    pub fn configure(
        &self,
        workspace_path: &Path,
        include_dir: &Path,
    ) -> Result<bool, ConfigurationError> {
        let mut descriptor = WorkspaceDescriptor::open(workspace_path)?;
        self.configure_descriptor(&mut descriptor, include_dir)
    }

    /// Patch and commit an already opened descriptor.
    pub fn configure_descriptor(
        &self,
        descriptor: &mut WorkspaceDescriptor,
        include_dir: &Path,
    ) -> Result<bool, ConfigurationError> {
        descriptor.set_include_dir(&self.marker, include_dir)?;
        descriptor.commit()
    }
}

impl Default for WorkspaceConfigurator {
    fn default() -> Self {
        WorkspaceConfigurator::new(DEFAULT_MARKER)
    }
}

/// Find the single marker line in `content`, read from `path`.
///
/// Zero or several matches are errors; nothing is ever rewritten blindly.
pub fn locate_marker(path: &Path, content: &str, marker: &str) -> Result<MarkerMatch, ConfigurationError> {
    let pattern = marker_pattern(marker)?;

    let mut matches: Vec<MarkerMatch> = pattern
        .captures_iter(content)
        .filter_map(|caps| caps.name("value"))
        .map(|value| MarkerMatch {
            line: line_number(content, value.start()),
            value: value.range(),
        })
        .collect();

    if matches.len() > 1 {
        return Err(ConfigurationError::MarkerAmbiguous {
            path: path.to_path_buf(),
            marker: marker.to_string(),
            lines: matches.iter().map(|m| m.line).collect(),
            spans: matches
                .iter()
                .map(|m| line_span(content, m.value.start))
                .collect(),
        });
    }

    matches.pop().ok_or_else(|| ConfigurationError::MarkerNotFound {
        path: path.to_path_buf(),
        marker: marker.to_string(),
    })
}

/// `"<value>"`, an optional comma and blanks, then the literal marker.
fn marker_pattern(marker: &str) -> Result<Regex, ConfigurationError> {
    let pattern = format!(
        r#""(?P<value>[^"\r\n]*)"[ \t]*,?[ \t]*{}"#,
        regex::escape(marker)
    );
    Regex::new(&pattern).map_err(|e| ConfigurationError::InvalidMarker {
        marker: marker.to_string(),
        message: e.to_string(),
    })
}

/// Bazel takes forward slashes on every host.
fn normalize_include_dir(include_dir: &Path) -> Result<String, ConfigurationError> {
    let value = include_dir.to_string_lossy().replace('\\', "/");

    if value.is_empty() || value.contains(['"', '\n', '\r']) {
        return Err(ConfigurationError::InvalidIncludeDir { value });
    }

    Ok(value)
}

fn line_number(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

fn line_span(content: &str, offset: usize) -> Range<usize> {
    let start = content[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = content[offset..]
        .find('\n')
        .map_or(content.len(), |i| offset + i);
    start..end
}
