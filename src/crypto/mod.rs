//! Cryptographic envelope for backups
//!
//! Provides AES-256-GCM encryption with PBKDF2-HMAC-SHA256 key derivation
//! for password-protected backup containers.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;

pub use encryption::{decrypt, encrypt, encrypt_with_params, EncryptedPayload, IV_SIZE, TAG_SIZE};
pub use key_derivation::{derive_key, DerivedKey, PBKDF2_ITERATIONS, SALT_SIZE};
pub use secure_memory::{SecureBytes, SecureString};
