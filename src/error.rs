//! Error types for the backup engine
//!
//! Every failure the engine can surface is a variant of [`BackupError`]. The
//! `Display` output of each variant is the message shown to the user, so
//! cryptographic internals never leak into it.

use std::fmt;

use thiserror::Error;

/// Message shown whenever authenticated decryption fails
pub const DECRYPT_FAILED_MESSAGE: &str = "Wrong password or corrupted file";

/// Why a restore was aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreFailure {
    /// Authenticated decryption rejected the password or ciphertext
    DecryptFailed,
    /// Any other failure, carrying the underlying message
    Other(String),
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecryptFailed => write!(f, "{}", DECRYPT_FAILED_MESSAGE),
            Self::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// The main error type for backup and restore operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// The container failed shape validation
    #[error("Unrecognized backup file: {0}")]
    InvalidFormat(String),

    /// An encrypted container was supplied without a password
    #[error("A password is required to restore this backup")]
    PasswordRequired,

    /// Authenticated decryption failed
    #[error("Wrong password or corrupted file")]
    Decrypt,

    /// The cipher or key derivation could not run at all
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Snapshot gathering failed; nothing was written or uploaded
    #[error("Failed to prepare backup: {0}")]
    Collection(String),

    /// Restore aborted
    #[error("Restore failed: {0}")]
    RestoreFailed(RestoreFailure),

    /// Key-value store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors for device records and inputs
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Cloud object storage errors
    #[error("Cloud storage error: {0}")]
    Cloud(String),

    /// Cloud storage is not authorized
    #[error("Cloud storage is not authorized")]
    Unauthorized,
}

impl BackupError {
    /// Create a "not found" error for devices
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Device",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for cloud backup files
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Wrap an error raised while restoring
    ///
    /// Decryption failures keep their dedicated reason; errors that already
    /// are restore failures, or password prompts, pass through unchanged.
    pub fn into_restore_failure(self) -> Self {
        match self {
            Self::Decrypt | Self::RestoreFailed(RestoreFailure::DecryptFailed) => {
                Self::RestoreFailed(RestoreFailure::DecryptFailed)
            }
            Self::RestoreFailed(_) | Self::PasswordRequired => self,
            other => Self::RestoreFailed(RestoreFailure::Other(other.to_string())),
        }
    }

    /// Check if this error means the password was wrong or the file corrupted
    pub fn is_decrypt_failure(&self) -> bool {
        matches!(
            self,
            Self::Decrypt | Self::RestoreFailed(RestoreFailure::DecryptFailed)
        )
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a container format error
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, Self::InvalidFormat(_))
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = BackupError::device_not_found("1700000000000");
        assert_eq!(err.to_string(), "Device not found: 1700000000000");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decrypt_message_never_generic() {
        assert_eq!(BackupError::Decrypt.to_string(), DECRYPT_FAILED_MESSAGE);

        let wrapped = BackupError::Decrypt.into_restore_failure();
        assert!(wrapped.is_decrypt_failure());
        assert_eq!(
            wrapped.to_string(),
            "Restore failed: Wrong password or corrupted file"
        );
    }

    #[test]
    fn test_into_restore_failure_passes_message_through() {
        let err = BackupError::Storage("disk full".into()).into_restore_failure();
        match err {
            BackupError::RestoreFailed(RestoreFailure::Other(reason)) => {
                assert_eq!(reason, "Storage error: disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_password_required_is_not_wrapped() {
        let err = BackupError::PasswordRequired.into_restore_failure();
        assert!(matches!(err, BackupError::PasswordRequired));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BackupError = io_err.into();
        assert!(matches!(err, BackupError::Io(_)));
    }
}
