//! Backup manager
//!
//! Entry point for hosts: builds containers from live state, sends them to a
//! file or the cloud, and restores from any of the three sources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::clock::{Clock, SystemClock};
use crate::config::{BackupConfig, BackupPaths};
use crate::error::{BackupError, BackupResult};
use crate::services::{DeviceService, SettingsService, UiNotifier};
use crate::storage::{JsonFileStore, KeyValueStore};

use super::cloud::{CloudStorage, FileMeta};
use super::collector::SnapshotCollector;
use super::container::{build_container, BackupContainer, BuildOptions, ContainerSummary};
use super::file::{parse_backup_bytes, read_backup_file, write_backup_file};
use super::restore::{RestoreEngine, RestoreReport};

/// Creates, exports and restores backups
pub struct BackupManager {
    config: BackupConfig,
    devices: DeviceService,
    settings: SettingsService,
    collector: SnapshotCollector,
    engine: RestoreEngine,
    cloud: Option<Arc<dyn CloudStorage>>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditLogger>,
}

impl BackupManager {
    /// Create a manager over the given store
    pub fn new(
        config: BackupConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn UiNotifier>,
        audit: Option<AuditLogger>,
    ) -> Self {
        let mut devices = DeviceService::new(store.clone(), clock.clone());
        let mut settings =
            SettingsService::new(store, clock.clone(), config.default_language.clone());
        if let Some(audit) = &audit {
            devices = devices.with_audit(audit.clone());
            settings = settings.with_audit(audit.clone());
        }

        let collector = SnapshotCollector::new(devices.clone(), settings.clone());
        let mut engine = RestoreEngine::new(
            devices.clone(),
            settings.clone(),
            notifier,
            clock.clone(),
        )
        .with_merge_mode(config.merge_mode);
        if let Some(audit) = &audit {
            engine = engine.with_audit(audit.clone());
        }

        Self {
            config,
            devices,
            settings,
            collector,
            engine,
            cloud: None,
            clock,
            audit,
        }
    }

    /// Open the on-disk installation at `paths`
    ///
    /// Uses the JSON file store, the audit log and the system clock.
    pub fn open(paths: &BackupPaths, notifier: Arc<dyn UiNotifier>) -> BackupResult<Self> {
        paths.ensure_directories()?;
        let config = BackupConfig::load_or_create(paths)?;
        let store = Arc::new(JsonFileStore::new(paths.store_file()));
        let audit = AuditLogger::new(paths.audit_log());

        Ok(Self::new(
            config,
            store,
            Arc::new(SystemClock),
            notifier,
            Some(audit),
        ))
    }

    /// Attach a cloud storage adapter
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudStorage>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceService {
        &self.devices
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn restore_engine(&self) -> &RestoreEngine {
        &self.engine
    }

    /// The attached cloud adapter
    pub fn cloud(&self) -> BackupResult<&Arc<dyn CloudStorage>> {
        self.cloud
            .as_ref()
            .ok_or_else(|| BackupError::Cloud("No cloud storage configured".into()))
    }

    /// How long a cloud authorization check is trusted under this config
    pub fn cloud_auth_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.cloud_auth_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Collect live state into a new container
    pub async fn create_container(&self, options: &BuildOptions) -> BackupResult<BackupContainer> {
        let snapshot = self.collector.collect().await?;
        build_container(
            &snapshot,
            options,
            &self.config.environment(),
            self.clock.now(),
        )
    }

    /// Write a new backup file into `dir`
    pub async fn export_to_file(&self, dir: &Path, options: &BuildOptions) -> BackupResult<PathBuf> {
        let container = self.create_container(options).await?;
        let path = write_backup_file(dir, &container, &self.config.product_name)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.record_export(&name, &container);

        Ok(path)
    }

    /// Upload a new backup and return the cloud file id
    pub async fn upload_to_cloud(&self, options: &BuildOptions) -> BackupResult<String> {
        let cloud = self.cloud()?;
        if !cloud.is_authorized().await? {
            return Err(BackupError::Unauthorized);
        }

        let container = self.create_container(options).await?;
        let name = container.file_name(&self.config.product_name);
        let id = cloud
            .upload_backup(&name, &container.to_pretty_json()?)
            .await?;

        tracing::info!(file = %name, id = %id, "uploaded backup");
        self.record_export(&name, &container);
        Ok(id)
    }

    /// Cloud backups, newest first
    pub async fn list_cloud_backups(&self) -> BackupResult<Vec<FileMeta>> {
        let mut files = self.cloud()?.list_backups().await?;
        files.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(files)
    }

    pub async fn restore_from_file(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> BackupResult<RestoreReport> {
        let container = read_backup_file(path)?;
        self.engine.restore(&container, password).await
    }

    /// Restore from raw bytes, e.g. a dropped file
    pub async fn restore_from_bytes(
        &self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> BackupResult<RestoreReport> {
        let container = parse_backup_bytes(bytes)?;
        self.engine.restore(&container, password).await
    }

    pub async fn restore_from_cloud(
        &self,
        id: &str,
        password: Option<&str>,
    ) -> BackupResult<RestoreReport> {
        let content = self.cloud()?.download_backup(id).await?;
        let container = parse_backup_bytes(content.as_bytes())?;
        self.engine.restore(&container, password).await
    }

    /// Describe a backup without restoring it
    pub fn inspect(&self, bytes: &[u8]) -> BackupResult<ContainerSummary> {
        Ok(parse_backup_bytes(bytes)?.summary())
    }

    fn record_export(&self, name: &str, container: &BackupContainer) {
        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry::create(
                self.clock.now(),
                EntityType::Backup,
                name,
                None,
                &container.summary(),
            ));
        }
    }
}
