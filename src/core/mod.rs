//! Core data structures for bazelext.
//!
//! - The project manifest and its extension targets
//! - Package metadata (version, requirements)
//! - Host platform and runtime facts

pub mod host;
pub mod manifest;
pub mod metadata;
pub mod platform;
pub mod target;

pub use host::HostRuntime;
pub use manifest::{find_manifest, Manifest, MANIFEST_NAME};
pub use metadata::PackageMetadata;
pub use platform::Platform;
pub use target::ExtensionTarget;
