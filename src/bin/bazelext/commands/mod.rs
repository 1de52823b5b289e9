//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod configure;
pub mod doctor;
pub mod metadata;
