//! Backup container format
//!
//! A container is the versioned JSON envelope around a snapshot. It is either
//! plaintext (`data`) or encrypted (`encryptedData`, `iv`, `salt`), selected
//! by the `encrypted` flag. Untrusted input goes through
//! [`validate_container`] before any field is read.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::BackupEnvironment;
use crate::crypto::{encrypt, EncryptedPayload, SecureString, IV_SIZE, SALT_SIZE, TAG_SIZE};
use crate::error::{BackupError, BackupResult};
use crate::models::Snapshot;

/// File name marker that flags an encrypted backup in listings
pub const ENCRYPTED_MARKER: &str = "-[encrypted]";

/// The payload a container carries
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerPayload {
    /// Snapshot JSON, always an object
    Plain(Value),
    Encrypted(EncryptedPayload),
}

/// A validated backup container
#[derive(Debug, Clone, PartialEq)]
pub struct BackupContainer {
    pub version: String,
    pub run_id: String,
    pub user_agent: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    pub password_hint: Option<String>,
    pub payload: ContainerPayload,
}

/// Wire shape of a container
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerWire<'a> {
    version: &'a str,
    run_id: &'a str,
    user_agent: &'a str,
    encrypted: bool,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iv: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<&'a str>,
}

impl Serialize for BackupContainer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (data, encrypted) = match &self.payload {
            ContainerPayload::Plain(data) => (Some(data), None),
            ContainerPayload::Encrypted(payload) => (None, Some(payload)),
        };

        ContainerWire {
            version: &self.version,
            run_id: &self.run_id,
            user_agent: &self.user_agent,
            encrypted: encrypted.is_some(),
            timestamp: self.timestamp,
            password_hint: self.password_hint.as_deref(),
            data,
            encrypted_data: encrypted.map(|p| p.encrypted_data.as_str()),
            iv: encrypted.map(|p| p.iv.as_str()),
            salt: encrypted.map(|p| p.salt.as_str()),
        }
        .serialize(serializer)
    }
}

impl BackupContainer {
    pub fn is_encrypted(&self) -> bool {
        matches!(self.payload, ContainerPayload::Encrypted(_))
    }

    /// Creation time, if the timestamp is in range
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Serialize as 2-space indented JSON
    pub fn to_pretty_json(&self) -> BackupResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Json(format!("Failed to serialize backup: {}", e)))
    }

    /// File name for this container under the given product name
    pub fn file_name(&self, product: &str) -> String {
        backup_file_name(
            product,
            self.created_at().unwrap_or_else(Utc::now),
            self.is_encrypted(),
        )
    }

    /// Describe the container without decrypting it
    pub fn summary(&self) -> ContainerSummary {
        let device_count = match &self.payload {
            ContainerPayload::Plain(data) => data
                .get("devices")
                .and_then(Value::as_array)
                .map(Vec::len),
            ContainerPayload::Encrypted(_) => None,
        };

        ContainerSummary {
            encrypted: self.is_encrypted(),
            password_hint: self.password_hint.clone(),
            version: self.version.clone(),
            run_id: self.run_id.clone(),
            created_at: self.created_at(),
            device_count,
        }
    }
}

/// What a UI needs to know before restoring a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub encrypted: bool,
    pub password_hint: Option<String>,
    pub version: String,
    pub run_id: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Unknown until an encrypted container is decrypted
    pub device_count: Option<usize>,
}

/// Options for building a container
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub encrypt: bool,
    pub password: Option<SecureString>,
    pub password_hint: Option<String>,
}

impl BuildOptions {
    /// Options for a plaintext container
    pub fn plain() -> Self {
        Self::default()
    }

    /// Options for an encrypted container
    pub fn encrypted(password: impl Into<String>, password_hint: Option<String>) -> Self {
        Self {
            encrypt: true,
            password: Some(SecureString::new(password)),
            password_hint,
        }
    }
}

/// Wrap a snapshot in a container stamped with the producer environment
pub fn build_container(
    snapshot: &Snapshot,
    options: &BuildOptions,
    env: &BackupEnvironment,
    now: DateTime<Utc>,
) -> BackupResult<BackupContainer> {
    let (payload, password_hint) = if options.encrypt {
        let password = options
            .password
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or(BackupError::PasswordRequired)?;
        (
            ContainerPayload::Encrypted(encrypt(snapshot, password.as_str())?),
            options.password_hint.clone(),
        )
    } else {
        let data = serde_json::to_value(snapshot)
            .map_err(|e| BackupError::Json(format!("Failed to serialize snapshot: {}", e)))?;
        (ContainerPayload::Plain(data), None)
    };

    Ok(BackupContainer {
        version: env.version.clone(),
        run_id: env.run_id.clone(),
        user_agent: env.user_agent.clone(),
        timestamp: now.timestamp_millis(),
        password_hint,
        payload,
    })
}

/// Validate untrusted JSON into a container
///
/// `version` and `runId` must be non-empty strings and `encrypted` a boolean.
/// The fields of the declared variant must then be present and well formed.
pub fn validate_container(raw: &Value) -> BackupResult<BackupContainer> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("backup is not a JSON object"))?;

    let version = required_string(obj, "version")?;
    let run_id = required_string(obj, "runId")?;
    let encrypted = obj
        .get("encrypted")
        .and_then(Value::as_bool)
        .ok_or_else(|| invalid("'encrypted' must be a boolean"))?;

    let user_agent = obj
        .get("userAgent")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let timestamp = obj
        .get("timestamp")
        .and_then(|t| t.as_i64().or_else(|| t.as_f64().map(|f| f as i64)))
        .unwrap_or_default();
    let password_hint = obj
        .get("passwordHint")
        .and_then(Value::as_str)
        .map(str::to_string);

    let payload = if encrypted {
        let encrypted_data = base64_field(obj, "encryptedData")?;
        let iv = base64_field(obj, "iv")?;
        let salt = base64_field(obj, "salt")?;

        if encrypted_data.1 < TAG_SIZE {
            return Err(invalid("'encryptedData' is too short"));
        }
        if iv.1 != IV_SIZE {
            return Err(invalid(format!("'iv' must decode to {} bytes", IV_SIZE)));
        }
        if salt.1 != SALT_SIZE {
            return Err(invalid(format!("'salt' must decode to {} bytes", SALT_SIZE)));
        }

        ContainerPayload::Encrypted(EncryptedPayload {
            encrypted_data: encrypted_data.0,
            iv: iv.0,
            salt: salt.0,
        })
    } else {
        match obj.get("data") {
            Some(data @ Value::Object(_)) => ContainerPayload::Plain(data.clone()),
            _ => return Err(invalid("'data' must be an object")),
        }
    };

    Ok(BackupContainer {
        version,
        run_id,
        user_agent,
        timestamp,
        password_hint,
        payload,
    })
}

/// Parse and validate container text
pub fn parse_container(text: &str) -> BackupResult<BackupContainer> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| invalid(format!("not valid JSON: {}", e)))?;
    validate_container(&raw)
}

/// `<product>-backup-<YYYY-MM-DD>[-[encrypted]].json`
pub fn backup_file_name(product: &str, at: DateTime<Utc>, encrypted: bool) -> String {
    format!(
        "{}-backup-{}{}.json",
        product,
        at.format("%Y-%m-%d"),
        if encrypted { ENCRYPTED_MARKER } else { "" }
    )
}

/// Whether a file name carries the encrypted marker
pub fn is_encrypted_file_name(name: &str) -> bool {
    name.contains(ENCRYPTED_MARKER)
}

fn invalid(reason: impl Into<String>) -> BackupError {
    BackupError::InvalidFormat(reason.into())
}

fn required_string(obj: &Map<String, Value>, key: &str) -> BackupResult<String> {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(invalid(format!("'{}' must be a non-empty string", key))),
    }
}

/// A base64 field and its decoded length
fn base64_field(obj: &Map<String, Value>, key: &str) -> BackupResult<(String, usize)> {
    let value = required_string(obj, key)?;
    let decoded = STANDARD
        .decode(&value)
        .map_err(|_| invalid(format!("'{}' is not valid base64", key)))?;
    Ok((value, decoded.len()))
}
