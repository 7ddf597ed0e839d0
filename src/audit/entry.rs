//! Audit entry data structures
//!
//! Defines the operations and entity types that are audited and the entry
//! format itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ENCRYPTION_CONFIG_KEY;

/// Placeholder written in place of credentials
const REDACTED: &str = "***";

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// A backup was restored over live state
    Restore,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Restore => write!(f, "RESTORE"),
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Device,
    DefaultDevice,
    AppSettings,
    Language,
    Backup,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Device => write!(f, "Device"),
            EntityType::DefaultDevice => write!(f, "DefaultDevice"),
            EntityType::AppSettings => write!(f, "AppSettings"),
            EntityType::Language => write!(f, "Language"),
            EntityType::Backup => write!(f, "Backup"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    pub entity_type: EntityType,

    pub entity_id: String,

    /// Human-readable description of the entity (e.g., device alias)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    /// Entity state before the operation, credentials redacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,

    /// Entity state after the operation, credentials redacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl AuditEntry {
    /// Entry for a create operation
    pub fn create<T: Serialize>(
        at: DateTime<Utc>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        entity: &T,
    ) -> Self {
        Self {
            timestamp: at,
            operation: Operation::Create,
            entity_type,
            entity_id: entity_id.into(),
            entity_name,
            before: None,
            after: redacted_value(entity),
            diff_summary: None,
        }
    }

    /// Entry for an update operation
    pub fn update<T: Serialize>(
        at: DateTime<Utc>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        before: &T,
        after: &T,
        diff_summary: Option<String>,
    ) -> Self {
        Self {
            timestamp: at,
            operation: Operation::Update,
            entity_type,
            entity_id: entity_id.into(),
            entity_name,
            before: redacted_value(before),
            after: redacted_value(after),
            diff_summary,
        }
    }

    /// Entry for a delete operation
    pub fn delete<T: Serialize>(
        at: DateTime<Utc>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        entity: &T,
    ) -> Self {
        Self {
            timestamp: at,
            operation: Operation::Delete,
            entity_type,
            entity_id: entity_id.into(),
            entity_name,
            before: redacted_value(entity),
            after: None,
            diff_summary: None,
        }
    }

    /// Entry recording a completed restore
    pub fn restore(
        at: DateTime<Utc>,
        backup_id: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: at,
            operation: Operation::Restore,
            entity_type: EntityType::Backup,
            entity_id: backup_id.into(),
            entity_name: None,
            before: None,
            after: None,
            diff_summary: Some(summary.into()),
        }
    }
}

/// Serialize an entity with any credential fields masked
fn redacted_value<T: Serialize>(entity: &T) -> Option<Value> {
    let mut value = serde_json::to_value(entity).ok()?;
    redact_secrets(&mut value);
    Some(value)
}

/// Mask device credentials and the push encryption key
pub fn redact_secrets(value: &mut Value) {
    mask_fields(value, "authorization", &["pwd", "value"]);
    mask_fields(value, ENCRYPTION_CONFIG_KEY, &["key"]);
}

fn mask_fields(value: &mut Value, object: &str, fields: &[&str]) {
    if let Some(Value::Object(inner)) = value.get_mut(object) {
        for field in fields {
            if let Some(secret) = inner.get_mut(*field) {
                *secret = Value::String(REDACTED.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Create.to_string(), "CREATE");
        assert_eq!(Operation::Restore.to_string(), "RESTORE");
    }

    #[test]
    fn test_create_entry() {
        let data = json!({"alias": "Phone"});
        let entry = AuditEntry::create(at(), EntityType::Device, "1", Some("Phone".into()), &data);

        assert_eq!(entry.operation, Operation::Create);
        assert_eq!(entry.entity_type, EntityType::Device);
        assert!(entry.before.is_none());
        assert_eq!(entry.after, Some(data));
    }

    #[test]
    fn test_credentials_redacted() {
        let data = json!({
            "alias": "Phone",
            "authorization": {"type": "basic", "user": "me", "pwd": "secret", "value": "Basic xyz"}
        });
        let entry = AuditEntry::delete(at(), EntityType::Device, "1", None, &data);

        let before = entry.before.unwrap();
        assert_eq!(before["authorization"]["user"], "me");
        assert_eq!(before["authorization"]["pwd"], REDACTED);
        assert_eq!(before["authorization"]["value"], REDACTED);
    }

    #[test]
    fn test_serialization() {
        let entry = AuditEntry::restore(at(), "bark-sender-backup-2024-03-09.json", "2 devices");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"entity_type\":\"backup\""));

        let parsed: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.operation, Operation::Restore);
    }

    #[test]
    fn test_encryption_key_redacted() {
        let before = json!({"themeMode": "dark"});
        let after = json!({
            "themeMode": "dark",
            "encryptionConfig": {"algorithm": "AES256", "mode": "CBC", "key": "0123456789abcdef"}
        });
        let entry = AuditEntry::update(
            at(),
            EntityType::AppSettings,
            "app_settings",
            None,
            &before,
            &after,
            None,
        );

        let after = entry.after.unwrap();
        assert_eq!(after["encryptionConfig"]["key"], REDACTED);
        assert_eq!(after["encryptionConfig"]["mode"], "CBC");
        assert_eq!(entry.before.unwrap(), before);
    }
}
