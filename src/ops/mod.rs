//! High-level operations.
//!
//! This module contains the implementation of bazelext commands.

pub mod build_ext;
pub mod doctor;

pub use build_ext::{build_extensions, plan, BuildOrchestrator, BuildReport, BuildState};
pub use doctor::{doctor, format_report, DoctorReport};
