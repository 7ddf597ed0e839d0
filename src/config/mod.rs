//! Configuration module
//!
//! This module provides configuration management including:
//! - Platform path resolution
//! - Engine configuration persistence

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{BackupConfig, BackupEnvironment, MergeMode};
