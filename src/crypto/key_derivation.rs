//! Key derivation using PBKDF2-HMAC-SHA256
//!
//! The iteration count is part of the backup format: a backup written with
//! one count can only be opened by a reader using the same count.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BackupError, BackupResult};

/// PBKDF2 iteration count used by every backup
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Size of the random salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// A derived encryption key, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the 256-bit backup key from a password and salt
pub fn derive_key(password: &str, salt: &[u8]) -> BackupResult<DerivedKey> {
    derive_key_with_iterations(password, salt, PBKDF2_ITERATIONS)
}

fn derive_key_with_iterations(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> BackupResult<DerivedKey> {
    if salt.len() != SALT_SIZE {
        return Err(BackupError::Crypto(format!(
            "Invalid salt size: expected {}, got {}",
            SALT_SIZE,
            salt.len()
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);

    Ok(DerivedKey { key })
}
