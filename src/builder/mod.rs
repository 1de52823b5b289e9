//! Bazel build driver.
//!
//! This module patches the workspace descriptor, invokes Bazel per target
//! and relocates the produced artifacts.

pub mod context;
pub mod errors;
pub mod events;
pub mod invoker;
pub mod relocate;
pub mod workspace;

pub use context::{BuildContext, BuildOverrides};
pub use errors::{BuildError, ConfigurationError};
pub use events::BuildEvent;
pub use invoker::{BazelInvocation, BazelTool, BuildInvoker, BuildTool, CompilationMode};
pub use relocate::{relocate, ArtifactLocation};
pub use workspace::{WorkspaceConfigurator, WorkspaceDescriptor};
