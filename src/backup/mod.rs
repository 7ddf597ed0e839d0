//! Backup and restore
//!
//! # Architecture
//!
//! - `SnapshotCollector`: reads live state into a `Snapshot`
//! - `BackupContainer`: the versioned envelope, plaintext or encrypted
//! - `RestoreEngine`: decrypts and merges a container into live state
//! - `BackupManager`: ties these to the file and cloud sources
//!
//! # Backup Format
//!
//! Containers are JSON objects with these fields:
//! - `version`, `runId`, `userAgent`: producer metadata
//! - `encrypted`: selects the payload variant
//! - `timestamp`: creation time in epoch milliseconds
//! - `passwordHint`: optional, encrypted containers only
//! - `data`: the snapshot, plaintext containers only
//! - `encryptedData`, `iv`, `salt`: base64 AES-256-GCM output, encrypted
//!   containers only
//!
//! Files are named `<product>-backup-<YYYY-MM-DD>.json`, with `-[encrypted]`
//! before the extension for encrypted containers.
//!
//! # Example
//!
//! ```rust,ignore
//! use bark_backup::backup::{BackupManager, BuildOptions};
//! use bark_backup::config::BackupPaths;
//! use bark_backup::services::NoopUiNotifier;
//!
//! let paths = BackupPaths::new()?;
//! let manager = BackupManager::open(&paths, Arc::new(NoopUiNotifier))?;
//!
//! let path = manager
//!     .export_to_file(&paths.export_dir(), &BuildOptions::encrypted("abc123", None))
//!     .await?;
//!
//! // Later, restore from the file
//! let report = manager.restore_from_file(&path, Some("abc123")).await?;
//! println!("{}", report.summary());
//! ```

mod cloud;
mod collector;
mod container;
mod file;
mod manager;
mod restore;

pub use cloud::{AuthorizationCache, CloudStorage, FileMeta, MemoryCloudStorage};
pub use collector::SnapshotCollector;
pub use container::{
    backup_file_name, build_container, is_encrypted_file_name, parse_container,
    validate_container, BackupContainer, BuildOptions, ContainerPayload, ContainerSummary,
    ENCRYPTED_MARKER,
};
pub use file::{parse_backup_bytes, read_backup_file, write_backup_file};
pub use manager::BackupManager;
pub use restore::{
    merge_devices, DeviceFailure, MergePlan, RestoreEngine, RestoreReport, RestoreState,
};
