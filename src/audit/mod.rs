//! Audit logging
//!
//! Records device, settings and restore mutations in an append-only
//! line-delimited JSON log.
//!
//! # Architecture
//!
//! - `AuditEntry`: one entry with timestamp, operation, entity information
//!   and optional before/after values (credentials masked).
//! - `AuditLogger`: appends entries to the log file and reads them back.
//! - `generate_diff`: summarizes top-level field changes for updates.
//!
//! # Example
//!
//! ```rust,ignore
//! use bark_backup::audit::{AuditEntry, AuditLogger, EntityType};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! let entry = AuditEntry::create(now, EntityType::Device, device.id.as_str(), Some(device.alias.clone()), &device);
//! logger.record(&entry);
//! ```

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{redact_secrets, AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
