//! Device service
//!
//! Device management over the key-value store: add, edit, remove and the
//! default-device pointer. Every mutation rewrites the whole device list.

use std::sync::Arc;

use chrono::Duration;

use crate::audit::{generate_diff, AuditEntry, AuditLogger, EntityType};
use crate::clock::Clock;
use crate::error::{BackupError, BackupResult};
use crate::models::{Device, DeviceDraft, DeviceId};
use crate::storage::{get_typed, keys, set_typed, KeyValueStore};

/// Service for device management
#[derive(Clone)]
pub struct DeviceService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditLogger>,
}

impl DeviceService {
    /// Create a new device service
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            audit: None,
        }
    }

    /// Record mutations in an audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Get all devices in list order
    pub async fn get_devices(&self) -> BackupResult<Vec<Device>> {
        Ok(get_typed(self.store.as_ref(), keys::DEVICES)
            .await?
            .unwrap_or_default())
    }

    /// Get the default device id, if one is set
    pub async fn get_default_device_id(&self) -> BackupResult<Option<DeviceId>> {
        let id: Option<DeviceId> = get_typed(self.store.as_ref(), keys::DEFAULT_DEVICE).await?;
        Ok(id.filter(|id| !id.is_empty()))
    }

    /// Create a device from user input
    ///
    /// The first device added while no default is set becomes the default.
    pub async fn add_device(&self, draft: DeviceDraft) -> BackupResult<Device> {
        let mut devices = self.get_devices().await?;

        // Ids are creation timestamps; bump until unique within the list
        let mut created = self.clock.now();
        while devices
            .iter()
            .any(|d| d.id == DeviceId::from_timestamp(created))
        {
            created += Duration::milliseconds(1);
        }

        let device =
            Device::new(draft, created).map_err(|e| BackupError::Validation(e.to_string()))?;

        devices.push(device.clone());
        self.save_devices(&devices).await?;
        self.log_create(&device);
        self.adopt_default_if_unset(&device.id).await?;

        Ok(device)
    }

    /// Insert a device that already has an identity
    ///
    /// Keeps the id and creation stamps and re-derives the URL parts.
    pub async fn import_device(&self, device: Device) -> BackupResult<Device> {
        let device = device
            .normalized()
            .map_err(|e| BackupError::Validation(e.to_string()))?;

        let mut devices = self.get_devices().await?;
        if devices.iter().any(|d| d.id == device.id) {
            return Err(BackupError::Validation(format!(
                "Device already exists: {}",
                device.id
            )));
        }

        devices.push(device.clone());
        self.save_devices(&devices).await?;
        self.log_create(&device);
        self.adopt_default_if_unset(&device.id).await?;

        Ok(device)
    }

    /// Replace a device with a record built from new input
    ///
    /// The replacement keeps the id, creation stamps and list position of
    /// the old record, and the default pointer follows it.
    pub async fn edit_device(&self, old_id: &DeviceId, draft: DeviceDraft) -> BackupResult<Device> {
        let mut devices = self.get_devices().await?;
        let position = devices
            .iter()
            .position(|d| &d.id == old_id)
            .ok_or_else(|| BackupError::device_not_found(old_id.as_str()))?;

        let old = devices[position].clone();
        let replacement =
            Device::with_identity(old.id.clone(), draft, old.created_at.clone(), old.timestamp)
                .map_err(|e| BackupError::Validation(e.to_string()))?;

        devices[position] = replacement.clone();
        self.save_devices(&devices).await?;

        if self.get_default_device_id().await?.as_ref() == Some(&old.id) {
            set_typed(self.store.as_ref(), keys::DEFAULT_DEVICE, &replacement.id).await?;
        }

        if let Some(audit) = &self.audit {
            let diff = match (serde_json::to_value(&old), serde_json::to_value(&replacement)) {
                (Ok(before), Ok(after)) => generate_diff(&before, &after),
                _ => None,
            };
            audit.record(&AuditEntry::update(
                self.clock.now(),
                EntityType::Device,
                replacement.id.as_str(),
                Some(replacement.alias.clone()),
                &old,
                &replacement,
                diff,
            ));
        }

        Ok(replacement)
    }

    /// Remove a device
    ///
    /// If it was the default, the first remaining device becomes the default.
    pub async fn remove_device(&self, id: &DeviceId) -> BackupResult<()> {
        let mut devices = self.get_devices().await?;
        let position = devices
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| BackupError::device_not_found(id.as_str()))?;

        let removed = devices.remove(position);
        self.save_devices(&devices).await?;

        if self.get_default_device_id().await?.as_ref() == Some(id) {
            match devices.first() {
                Some(next) => {
                    set_typed(self.store.as_ref(), keys::DEFAULT_DEVICE, &next.id).await?
                }
                None => self.store.remove(keys::DEFAULT_DEVICE).await?,
            }
        }

        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry::delete(
                self.clock.now(),
                EntityType::Device,
                removed.id.as_str(),
                Some(removed.alias.clone()),
                &removed,
            ));
        }

        Ok(())
    }

    /// Point the default device at an existing device
    pub async fn set_default_device(&self, id: &DeviceId) -> BackupResult<()> {
        let devices = self.get_devices().await?;
        if !devices.iter().any(|d| &d.id == id) {
            return Err(BackupError::device_not_found(id.as_str()));
        }

        let previous = self.get_default_device_id().await?;
        set_typed(self.store.as_ref(), keys::DEFAULT_DEVICE, id).await?;

        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry::update(
                self.clock.now(),
                EntityType::DefaultDevice,
                id.as_str(),
                None,
                &previous,
                &Some(id.clone()),
                None,
            ));
        }

        Ok(())
    }

    /// Replace the whole device list in a single write
    pub async fn replace_all(&self, devices: &[Device]) -> BackupResult<()> {
        self.save_devices(devices).await?;
        if let Some(first) = devices.first() {
            self.adopt_default_if_unset(&first.id).await?;
        }
        Ok(())
    }

    async fn save_devices(&self, devices: &[Device]) -> BackupResult<()> {
        set_typed(self.store.as_ref(), keys::DEVICES, devices).await
    }

    async fn adopt_default_if_unset(&self, id: &DeviceId) -> BackupResult<()> {
        if self.get_default_device_id().await?.is_none() {
            tracing::debug!(device = %id, "first device becomes default");
            set_typed(self.store.as_ref(), keys::DEFAULT_DEVICE, id).await?;
        }
        Ok(())
    }

    fn log_create(&self, device: &Device) {
        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry::create(
                self.clock.now(),
                EntityType::Device,
                device.id.as_str(),
                Some(device.alias.clone()),
                device,
            ));
        }
    }
}
