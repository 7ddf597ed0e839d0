//! Restore and merge
//!
//! Applies a validated container to live state. Devices are merged by id as
//! a union: backup devices replace or join live ones, and live devices the
//! backup does not mention survive. Settings are overwritten wholesale. A bad
//! device record is reported and skipped, never fatal.
//!
//! Restores are not transactional. Device changes made before a later step
//! fails stay in place.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::audit::{AuditEntry, AuditLogger};
use crate::clock::Clock;
use crate::config::MergeMode;
use crate::error::{BackupError, BackupResult};
use crate::models::{Device, DeviceDraft, DeviceId, RawSnapshot, ThemeMode};
use crate::services::{DeviceService, SettingsService, UiNotifier};

use super::container::{BackupContainer, ContainerPayload};

/// Progress of the current restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreState {
    #[default]
    Idle,
    /// The container is encrypted and no password was given
    AwaitingPassword,
    Decrypting,
    Merging,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingPassword => "awaiting password",
            Self::Decrypting => "decrypting",
            Self::Merging => "merging",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A backup device that could not be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    /// Device id, or `#<index>` when the record has no usable id
    pub device: String,
    pub reason: String,
}

/// Outcome of a successful restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub added: Vec<DeviceId>,
    pub updated: Vec<DeviceId>,
    pub failures: Vec<DeviceFailure>,
    pub default_restored: bool,
    pub settings_restored: bool,
    pub language_restored: bool,
    pub theme_applied: Option<ThemeMode>,
}

impl RestoreReport {
    /// Check if every backup device was restored
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} added", self.added.len()),
            format!("{} updated", self.updated.len()),
        ];
        if !self.failures.is_empty() {
            parts.push(format!("{} failed", self.failures.len()));
        }
        if self.default_restored {
            parts.push("default device".to_string());
        }
        if self.settings_restored {
            parts.push("settings".to_string());
        }
        if self.language_restored {
            parts.push("language".to_string());
        }
        format!("Restored: {}", parts.join(", "))
    }
}

/// Target device list computed from live and backup devices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub devices: Vec<Device>,
    pub added: Vec<DeviceId>,
    pub updated: Vec<DeviceId>,
    pub failures: Vec<DeviceFailure>,
}

/// Merge backup device records into the live list without side effects
///
/// Matching ids are replaced in place, keeping the live creation stamps.
/// New ids are appended in backup order.
pub fn merge_devices(live: &[Device], backup: Vec<Value>) -> MergePlan {
    let mut plan = MergePlan {
        devices: live.to_vec(),
        ..MergePlan::default()
    };

    for (index, raw) in backup.into_iter().enumerate() {
        let incoming = match parse_backup_device(index, raw) {
            Ok(device) => device,
            Err(failure) => {
                plan.failures.push(failure);
                continue;
            }
        };

        match plan.devices.iter().position(|d| d.id == incoming.id) {
            Some(position) => {
                let current = &plan.devices[position];
                match Device::with_identity(
                    current.id.clone(),
                    DeviceDraft::from(&incoming),
                    current.created_at.clone(),
                    current.timestamp,
                ) {
                    Ok(replacement) => {
                        plan.updated.push(replacement.id.clone());
                        plan.devices[position] = replacement;
                    }
                    Err(e) => plan.failures.push(DeviceFailure {
                        device: incoming.id.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
            None => {
                plan.added.push(incoming.id.clone());
                plan.devices.push(incoming);
            }
        }
    }

    plan
}

/// Read one backup device record, normalizing its URL
fn parse_backup_device(index: usize, raw: Value) -> Result<Device, DeviceFailure> {
    let label = raw
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index));

    let device: Device = serde_json::from_value(raw).map_err(|e| DeviceFailure {
        device: label.clone(),
        reason: format!("malformed device: {}", e),
    })?;

    device.normalized().map_err(|e| DeviceFailure {
        device: label,
        reason: e.to_string(),
    })
}

/// Applies backups to live state, one restore at a time
pub struct RestoreEngine {
    devices: DeviceService,
    settings: SettingsService,
    notifier: Arc<dyn UiNotifier>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditLogger>,
    merge_mode: MergeMode,
    lock: Mutex<()>,
    state: watch::Sender<RestoreState>,
}

impl RestoreEngine {
    pub fn new(
        devices: DeviceService,
        settings: SettingsService,
        notifier: Arc<dyn UiNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(RestoreState::Idle);
        Self {
            devices,
            settings,
            notifier,
            clock,
            audit: None,
            merge_mode: MergeMode::default(),
            lock: Mutex::new(()),
            state,
        }
    }

    pub fn with_merge_mode(mut self, merge_mode: MergeMode) -> Self {
        self.merge_mode = merge_mode;
        self
    }

    /// Record completed restores in an audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Watch restore progress
    pub fn subscribe(&self) -> watch::Receiver<RestoreState> {
        self.state.subscribe()
    }

    /// The state of the latest restore
    pub fn state(&self) -> RestoreState {
        *self.state.borrow()
    }

    /// Restore a container into live state
    ///
    /// Encrypted containers need a non-empty password. Failures other than a
    /// missing password come back as [`BackupError::RestoreFailed`].
    pub async fn restore(
        &self,
        container: &BackupContainer,
        password: Option<&str>,
    ) -> BackupResult<RestoreReport> {
        let _guard = self.lock.lock().await;
        self.set_state(RestoreState::Idle);

        match self.run(container, password).await {
            Ok(report) => {
                self.set_state(RestoreState::Done);
                tracing::info!(
                    run_id = %container.run_id,
                    added = report.added.len(),
                    updated = report.updated.len(),
                    failed = report.failures.len(),
                    "restore complete"
                );
                if let Some(audit) = &self.audit {
                    audit.record(&AuditEntry::restore(
                        self.clock.now(),
                        container.run_id.as_str(),
                        report.summary(),
                    ));
                }
                Ok(report)
            }
            Err(BackupError::PasswordRequired) => {
                self.set_state(RestoreState::AwaitingPassword);
                Err(BackupError::PasswordRequired)
            }
            Err(e) => {
                self.set_state(RestoreState::Failed);
                tracing::warn!(error = %e, "restore failed");
                Err(e.into_restore_failure())
            }
        }
    }

    async fn run(
        &self,
        container: &BackupContainer,
        password: Option<&str>,
    ) -> BackupResult<RestoreReport> {
        let data = match &container.payload {
            ContainerPayload::Plain(data) => data.clone(),
            ContainerPayload::Encrypted(payload) => {
                let password = password
                    .filter(|p| !p.is_empty())
                    .ok_or(BackupError::PasswordRequired)?;
                self.set_state(RestoreState::Decrypting);
                payload.decrypt(password)?
            }
        };
        let snapshot = RawSnapshot::from_value(data)?;

        let mut report = RestoreReport::default();

        self.set_state(RestoreState::Merging);
        match self.merge_mode {
            MergeMode::Sequential => self.merge_sequential(snapshot.devices, &mut report).await?,
            MergeMode::Atomic => self.merge_atomic(snapshot.devices, &mut report).await?,
        }

        self.set_state(RestoreState::Applying);
        report.default_restored = self
            .restore_default_device(snapshot.default_device_id.as_deref())
            .await?;

        if let Some(app_settings) = &snapshot.app_settings {
            self.settings.save_app_settings(app_settings).await?;
            report.settings_restored = true;

            if let Some(mode) = app_settings.theme_mode() {
                self.notifier.apply_theme(mode).await;
                report.theme_applied = Some(mode);
            }
        }

        if let Some(language) = &snapshot.language {
            match self.settings.set_language(language).await {
                Ok(()) => report.language_restored = true,
                Err(e) => tracing::warn!(error = %e, "failed to restore language"),
            }
        }

        self.notifier.settings_changed().await;

        Ok(report)
    }

    async fn merge_sequential(
        &self,
        backup: Vec<Value>,
        report: &mut RestoreReport,
    ) -> BackupResult<()> {
        let mut live_ids: HashSet<DeviceId> = self
            .devices
            .get_devices()
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();

        for (index, raw) in backup.into_iter().enumerate() {
            let incoming = match parse_backup_device(index, raw) {
                Ok(device) => device,
                Err(failure) => {
                    tracing::warn!(device = %failure.device, reason = %failure.reason, "skipping backup device");
                    report.failures.push(failure);
                    continue;
                }
            };

            let id = incoming.id.clone();
            let outcome = if live_ids.contains(&id) {
                self.devices
                    .edit_device(&id, DeviceDraft::from(&incoming))
                    .await
                    .map(|_| false)
            } else {
                self.devices.import_device(incoming).await.map(|_| true)
            };

            match outcome {
                Ok(true) => {
                    tracing::debug!(device = %id, "added device from backup");
                    live_ids.insert(id.clone());
                    report.added.push(id);
                }
                Ok(false) => {
                    tracing::debug!(device = %id, "updated device from backup");
                    report.updated.push(id);
                }
                Err(e) => {
                    tracing::warn!(device = %id, error = %e, "failed to restore device");
                    report.failures.push(DeviceFailure {
                        device: id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    async fn merge_atomic(&self, backup: Vec<Value>, report: &mut RestoreReport) -> BackupResult<()> {
        let live = self.devices.get_devices().await?;
        let plan = merge_devices(&live, backup);

        for failure in &plan.failures {
            tracing::warn!(device = %failure.device, reason = %failure.reason, "skipping backup device");
        }

        self.devices.replace_all(&plan.devices).await?;

        report.added = plan.added;
        report.updated = plan.updated;
        report.failures = plan.failures;
        Ok(())
    }

    /// Point the default at the backup's default if that device is live now
    async fn restore_default_device(&self, default_id: Option<&str>) -> BackupResult<bool> {
        let Some(default_id) = default_id.map(DeviceId::from).filter(|id| !id.is_empty()) else {
            return Ok(false);
        };

        let live = self.devices.get_devices().await?;
        if !live.iter().any(|d| d.id == default_id) {
            tracing::debug!(device = %default_id, "backup default device not present, skipping");
            return Ok(false);
        }

        self.devices.set_default_device(&default_id).await?;
        Ok(true)
    }

    fn set_state(&self, state: RestoreState) {
        tracing::debug!(%state, "restore state");
        self.state.send_replace(state);
    }
}
