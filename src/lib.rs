//! bark-backup - Encrypted backup and restore for the Bark sender app
//!
//! This library captures the sender's state (devices, default device,
//! settings and language) into a versioned backup container, optionally
//! password-encrypted, and restores containers from a file, dropped bytes or
//! cloud storage by merging them into live state.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `clock`: Injected time source
//! - `crypto`: PBKDF2 + AES-256-GCM envelope encryption
//! - `models`: Devices, settings and snapshots
//! - `storage`: Key-value store and identity capabilities
//! - `services`: Device and settings management
//! - `audit`: Audit logging system
//! - `backup`: Containers, collection, restore and backup sources
//!
//! # Example
//!
//! ```rust,ignore
//! use bark_backup::backup::{BackupManager, BuildOptions};
//! use bark_backup::config::BackupPaths;
//!
//! let paths = BackupPaths::new()?;
//! let manager = BackupManager::open(&paths, Arc::new(NoopUiNotifier))?;
//! let container = manager.create_container(&BuildOptions::plain()).await?;
//! ```

pub mod audit;
pub mod backup;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{BackupError, BackupResult, RestoreFailure};
