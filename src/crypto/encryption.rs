//! AES-256-GCM envelope encryption of JSON payloads
//!
//! A payload is serialized to canonical JSON, encrypted under a key derived
//! from the password and a per-call salt, and returned as three base64
//! strings. The GCM tag travels at the end of `encrypted_data`.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackupError, BackupResult};

use super::key_derivation::{derive_key, generate_salt, SALT_SIZE};
use super::secure_memory::SecureBytes;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag appended to the ciphertext
pub const TAG_SIZE: usize = 16;

/// Ciphertext, IV and salt of one encryption, each base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Ciphertext with the authentication tag appended
    pub encrypted_data: String,
    /// The 12-byte nonce
    pub iv: String,
    /// The 16-byte PBKDF2 salt
    pub salt: String,
}

impl EncryptedPayload {
    fn from_parts(ciphertext: &[u8], iv: &[u8], salt: &[u8]) -> Self {
        Self {
            encrypted_data: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
            salt: STANDARD.encode(salt),
        }
    }

    /// Decrypt this payload with the given password
    pub fn decrypt(&self, password: &str) -> BackupResult<Value> {
        decrypt(&self.encrypted_data, &self.iv, &self.salt, password)
    }
}

/// Encrypt a payload with a fresh random salt and IV
pub fn encrypt<T>(payload: &T, password: &str) -> BackupResult<EncryptedPayload>
where
    T: Serialize + ?Sized,
{
    let salt = generate_salt();
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    encrypt_with_params(payload, password, &salt, &iv)
}

/// Encrypt a payload with a caller-supplied salt and IV
///
/// Output is fully determined by the inputs. Never reuse a salt/IV pair for
/// real backups; this exists so tests can pin exact ciphertexts.
pub fn encrypt_with_params<T>(
    payload: &T,
    password: &str,
    salt: &[u8; SALT_SIZE],
    iv: &[u8; IV_SIZE],
) -> BackupResult<EncryptedPayload>
where
    T: Serialize + ?Sized,
{
    if password.is_empty() {
        return Err(BackupError::PasswordRequired);
    }

    let plaintext = canonical_json(payload)?;
    let key = derive_key(password, salt)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| BackupError::Crypto(format!("Failed to create cipher: {}", e)))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(iv), plaintext.as_bytes())
        .map_err(|e| BackupError::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedPayload::from_parts(&ciphertext, iv, salt))
}

/// Decrypt base64 ciphertext, IV and salt back into the JSON payload
///
/// Any failure after the inputs are read (bad encoding, wrong sizes, tag
/// mismatch, non-JSON plaintext) is reported as [`BackupError::Decrypt`].
pub fn decrypt(encrypted_data: &str, iv: &str, salt: &str, password: &str) -> BackupResult<Value> {
    let ciphertext = decode_field("encryptedData", encrypted_data)?;
    let iv = decode_field("iv", iv)?;
    let salt = decode_field("salt", salt)?;

    if iv.len() != IV_SIZE || salt.len() != SALT_SIZE || ciphertext.len() < TAG_SIZE {
        tracing::debug!(
            iv_len = iv.len(),
            salt_len = salt.len(),
            ciphertext_len = ciphertext.len(),
            "encrypted payload has invalid sizes"
        );
        return Err(BackupError::Decrypt);
    }

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| BackupError::Crypto(format!("Failed to create cipher: {}", e)))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map(SecureBytes::from)
        .map_err(|_| BackupError::Decrypt)?;

    serde_json::from_slice(plaintext.as_bytes()).map_err(|e| {
        tracing::debug!(error = %e, "decrypted payload is not valid JSON");
        BackupError::Decrypt
    })
}

/// Serialize a payload to JSON with object keys in sorted order
fn canonical_json<T>(payload: &T) -> BackupResult<SecureBytes>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(payload)
        .map_err(|e| BackupError::Json(format!("Failed to serialize payload: {}", e)))?;
    let bytes = serde_json::to_vec(&value)
        .map_err(|e| BackupError::Json(format!("Failed to serialize payload: {}", e)))?;
    Ok(SecureBytes::from(bytes))
}

fn decode_field(name: &str, encoded: &str) -> BackupResult<Vec<u8>> {
    STANDARD.decode(encoded).map_err(|e| {
        tracing::debug!(field = name, error = %e, "invalid base64 in encrypted payload");
        BackupError::Decrypt
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SALT: [u8; SALT_SIZE] = [7u8; SALT_SIZE];
    const IV: [u8; IV_SIZE] = [9u8; IV_SIZE];

    fn sample_snapshot() -> Value {
        json!({
            "devices": [{"id": "1", "alias": "Phone", "apiURL": "https://api.day.app/key/"}],
            "defaultDeviceId": "1",
            "appSettings": {"themeMode": "dark", "encryptionConfig": {"algorithm": "AES256"}},
            "language": "en"
        })
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let snapshot = sample_snapshot();
        let encrypted = encrypt(&snapshot, "abc123").unwrap();
        let decrypted = encrypted.decrypt("abc123").unwrap();
        assert_eq!(decrypted, snapshot);
    }

    #[test]
    fn test_field_sizes() {
        let encrypted = encrypt(&json!({"a": 1}), "abc123").unwrap();
        assert_eq!(STANDARD.decode(&encrypted.iv).unwrap().len(), IV_SIZE);
        assert_eq!(STANDARD.decode(&encrypted.salt).unwrap().len(), SALT_SIZE);

        let plaintext_len = serde_json::to_vec(&json!({"a": 1})).unwrap().len();
        let ciphertext = STANDARD.decode(&encrypted.encrypted_data).unwrap();
        assert_eq!(ciphertext.len(), plaintext_len + TAG_SIZE);
    }

    #[test]
    fn test_fresh_salt_and_iv_per_call() {
        let snapshot = sample_snapshot();
        let first = encrypt(&snapshot, "abc123").unwrap();
        let second = encrypt(&snapshot, "abc123").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.encrypted_data, second.encrypted_data);
    }

    #[test]
    fn test_fixed_params_are_deterministic() {
        let snapshot = sample_snapshot();
        let first = encrypt_with_params(&snapshot, "abc123", &SALT, &IV).unwrap();
        let second = encrypt_with_params(&snapshot, "abc123", &SALT, &IV).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.iv, STANDARD.encode(IV));
        assert_eq!(first.salt, STANDARD.encode(SALT));
    }

    #[test]
    fn test_key_order_does_not_change_ciphertext() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let first = encrypt_with_params(&a, "abc123", &SALT, &IV).unwrap();
        let second = encrypt_with_params(&b, "abc123", &SALT, &IV).unwrap();
        assert_eq!(first.encrypted_data, second.encrypted_data);
    }

    #[test]
    fn test_wrong_password_fails() {
        let encrypted = encrypt(&sample_snapshot(), "abc123").unwrap();
        let result = encrypted.decrypt("wrong");
        assert!(matches!(result, Err(BackupError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut encrypted = encrypt(&sample_snapshot(), "abc123").unwrap();

        let mut ciphertext = STANDARD.decode(&encrypted.encrypted_data).unwrap();
        let middle = ciphertext.len() / 2;
        ciphertext[middle] ^= 0x01;
        encrypted.encrypted_data = STANDARD.encode(&ciphertext);

        assert!(matches!(
            encrypted.decrypt("abc123"),
            Err(BackupError::Decrypt)
        ));
    }

    #[test]
    fn test_tampered_tag_fails() {
        let mut encrypted = encrypt(&json!({"language": "en"}), "abc123").unwrap();

        let mut ciphertext = STANDARD.decode(&encrypted.encrypted_data).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x80;
        encrypted.encrypted_data = STANDARD.encode(&ciphertext);

        assert!(matches!(
            encrypted.decrypt("abc123"),
            Err(BackupError::Decrypt)
        ));
    }

    #[test]
    fn test_bad_encoding_is_decrypt_error() {
        let result = decrypt("not base64!!", "AAAAAAAAAAAAAAAA", "AAAAAAAAAAAAAAAAAAAAAA==", "p");
        assert!(matches!(result, Err(BackupError::Decrypt)));
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = encrypt(&sample_snapshot(), "");
        assert!(matches!(result, Err(BackupError::PasswordRequired)));
    }

    #[test]
    fn test_unicode_payload() {
        let snapshot = json!({"devices": [{"alias": "手机 📱"}], "language": "zh-CN"});
        let encrypted = encrypt(&snapshot, "пароль").unwrap();
        assert_eq!(encrypted.decrypt("пароль").unwrap(), snapshot);
    }
}
