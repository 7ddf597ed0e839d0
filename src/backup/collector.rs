//! Snapshot collection
//!
//! Reads devices, the default device, settings and language concurrently.
//! Collection is all-or-nothing: any failed read fails the whole snapshot.

use crate::error::{BackupError, BackupResult};
use crate::models::Snapshot;
use crate::services::{DeviceService, SettingsService};

/// Gathers the live application state into a [`Snapshot`]
#[derive(Clone)]
pub struct SnapshotCollector {
    devices: DeviceService,
    settings: SettingsService,
}

impl SnapshotCollector {
    pub fn new(devices: DeviceService, settings: SettingsService) -> Self {
        Self { devices, settings }
    }

    /// Capture the current state
    pub async fn collect(&self) -> BackupResult<Snapshot> {
        let (devices, default_device_id, app_settings, language) = tokio::try_join!(
            self.devices.get_devices(),
            self.devices.get_default_device_id(),
            self.settings.get_app_settings(),
            self.settings.get_language(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "snapshot collection failed");
            BackupError::Collection(e.to_string())
        })?;

        tracing::debug!(devices = devices.len(), "collected snapshot");

        Ok(Snapshot {
            devices,
            default_device_id: default_device_id.map(|id| id.to_string()).unwrap_or_default(),
            app_settings,
            language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::clock::SystemClock;
    use crate::models::DeviceDraft;
    use crate::storage::{keys, KeyValueStore, MemoryStore};

    /// Store whose reads of one key always fail
    struct BrokenKeyStore {
        inner: MemoryStore,
        broken: &'static str,
    }

    #[async_trait]
    impl KeyValueStore for BrokenKeyStore {
        async fn get(&self, key: &str) -> BackupResult<Option<Value>> {
            if key == self.broken {
                return Err(BackupError::Storage("read rejected".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> BackupResult<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> BackupResult<()> {
            self.inner.remove(key).await
        }
    }

    fn collector(store: Arc<dyn KeyValueStore>) -> (SnapshotCollector, DeviceService) {
        let clock = Arc::new(SystemClock);
        let devices = DeviceService::new(store.clone(), clock.clone());
        let settings = SettingsService::new(store, clock, "en");
        (SnapshotCollector::new(devices.clone(), settings), devices)
    }

    #[tokio::test]
    async fn test_collect_live_state() {
        let store = Arc::new(MemoryStore::with_entries([
            (keys::APP_SETTINGS, json!({"themeMode": "dark"})),
            (keys::LANGUAGE, json!("de")),
        ]));
        let (collector, devices) = collector(store);
        let device = devices
            .add_device(DeviceDraft::new("Phone", "api.day.app/key"))
            .await
            .unwrap();

        let snapshot = collector.collect().await.unwrap();
        assert_eq!(snapshot.devices, vec![device.clone()]);
        assert_eq!(snapshot.default_device_id, device.id.as_str());
        assert_eq!(snapshot.app_settings.get("themeMode"), Some(&json!("dark")));
        assert_eq!(snapshot.language, "de");
    }

    #[tokio::test]
    async fn test_empty_state() {
        let (collector, _) = collector(Arc::new(MemoryStore::new()));
        let snapshot = collector.collect().await.unwrap();

        assert!(snapshot.devices.is_empty());
        assert_eq!(snapshot.default_device_id, "");
        assert!(snapshot.app_settings.is_empty());
        assert_eq!(snapshot.language, "en");
    }

    #[tokio::test]
    async fn test_any_failed_read_fails_collection() {
        for broken in [keys::DEVICES, keys::DEFAULT_DEVICE, keys::APP_SETTINGS, keys::LANGUAGE] {
            let store = Arc::new(BrokenKeyStore {
                inner: MemoryStore::new(),
                broken,
            });
            let (collector, _) = collector(store);

            let err = collector.collect().await.unwrap_err();
            assert!(
                matches!(err, BackupError::Collection(_)),
                "{} should fail collection",
                broken
            );
        }
    }
}
