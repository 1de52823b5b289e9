//! Bazelext - build native extension modules with Bazel.
//!
//! This crate provides the library behind the `bazelext` command: reading
//! the project manifest, pointing the Bazel workspace at the host runtime's
//! headers, invoking Bazel for each extension target and copying the
//! resulting shared libraries into the packaging tree.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for bazelext unit tests.
///
/// Only available under `cfg(test)`. Provides workspace fixtures and a
/// recording build tool that stands in for Bazel.
#[cfg(test)]
pub mod test_support;

pub use core::{manifest::Manifest, target::ExtensionTarget};
pub use util::context::GlobalContext;
