//! Application state snapshots
//!
//! [`Snapshot`] is what a backup captures. [`RawSnapshot`] is how a restore
//! reads one back: every field is optional and devices stay untyped so a
//! single malformed entry cannot reject the whole file.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackupError, BackupResult};

use super::device::Device;
use super::settings::AppSettings;

/// Application state captured by a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub devices: Vec<Device>,
    /// May name a device that is not in `devices`
    pub default_device_id: String,
    pub app_settings: AppSettings,
    pub language: String,
}

/// A snapshot as read from an untrusted backup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    #[serde(default)]
    pub devices: Vec<Value>,
    #[serde(default)]
    pub default_device_id: Option<String>,
    #[serde(default)]
    pub app_settings: Option<AppSettings>,
    #[serde(default)]
    pub language: Option<String>,
}

impl RawSnapshot {
    /// Read a snapshot out of a container payload
    pub fn from_value(value: Value) -> BackupResult<Self> {
        if !value.is_object() {
            return Err(BackupError::InvalidFormat(
                "backup data is not an object".into(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| BackupError::InvalidFormat(format!("malformed backup data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_wire_names() {
        let snapshot = Snapshot {
            devices: Vec::new(),
            default_device_id: "1".into(),
            app_settings: AppSettings::new(),
            language: "en".into(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            json!({"devices": [], "defaultDeviceId": "1", "appSettings": {}, "language": "en"})
        );
    }

    #[test]
    fn test_raw_snapshot_tolerates_missing_fields() {
        let raw = RawSnapshot::from_value(json!({"devices": [{"id": "1"}, 42]})).unwrap();
        assert_eq!(raw.devices.len(), 2);
        assert!(raw.default_device_id.is_none());
        assert!(raw.app_settings.is_none());
        assert!(raw.language.is_none());
    }

    #[test]
    fn test_raw_snapshot_null_default() {
        let raw = RawSnapshot::from_value(json!({"defaultDeviceId": null})).unwrap();
        assert!(raw.default_device_id.is_none());
    }

    #[test]
    fn test_raw_snapshot_rejects_non_object() {
        let err = RawSnapshot::from_value(json!([1, 2])).unwrap_err();
        assert!(err.is_invalid_format());

        let err = RawSnapshot::from_value(json!({"devices": "nope"})).unwrap_err();
        assert!(err.is_invalid_format());
    }
}
