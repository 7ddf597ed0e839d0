//! Settings service
//!
//! Application settings and the UI language, plus the [`UiNotifier`] hook the
//! restore flow uses to push changes into a running UI.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audit::{generate_diff, AuditEntry, AuditLogger, EntityType};
use crate::clock::Clock;
use crate::error::BackupResult;
use crate::models::{AppSettings, ThemeMode};
use crate::storage::{get_typed, keys, set_typed, KeyValueStore};

/// Receives UI side effects of a settings change
#[async_trait]
pub trait UiNotifier: Send + Sync {
    /// Switch the running theme
    async fn apply_theme(&self, mode: ThemeMode);

    /// Tell the UI that settings were replaced wholesale
    async fn settings_changed(&self);
}

/// A notifier for hosts without a UI
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUiNotifier;

#[async_trait]
impl UiNotifier for NoopUiNotifier {
    async fn apply_theme(&self, _mode: ThemeMode) {}

    async fn settings_changed(&self) {}
}

/// Service for settings and language management
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditLogger>,
    default_language: String,
}

impl SettingsService {
    /// Create a new settings service
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            audit: None,
            default_language: default_language.into(),
        }
    }

    /// Record mutations in an audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Get the settings object; empty if never saved
    pub async fn get_app_settings(&self) -> BackupResult<AppSettings> {
        Ok(get_typed(self.store.as_ref(), keys::APP_SETTINGS)
            .await?
            .unwrap_or_default())
    }

    /// Replace the settings object
    pub async fn save_app_settings(&self, settings: &AppSettings) -> BackupResult<()> {
        let previous = self.get_app_settings().await?;
        set_typed(self.store.as_ref(), keys::APP_SETTINGS, settings).await?;

        if let Some(audit) = &self.audit {
            let diff = match (
                serde_json::to_value(&previous),
                serde_json::to_value(settings),
            ) {
                (Ok(before), Ok(after)) => generate_diff(&before, &after),
                _ => None,
            };
            audit.record(&AuditEntry::update(
                self.clock.now(),
                EntityType::AppSettings,
                keys::APP_SETTINGS,
                None,
                &previous,
                settings,
                diff,
            ));
        }

        Ok(())
    }

    /// Get the active language code
    pub async fn get_language(&self) -> BackupResult<String> {
        let language: Option<String> = get_typed(self.store.as_ref(), keys::LANGUAGE).await?;
        Ok(language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.default_language.clone()))
    }

    /// Set the active language code
    pub async fn set_language(&self, language: &str) -> BackupResult<()> {
        let previous = self.get_language().await?;
        set_typed(self.store.as_ref(), keys::LANGUAGE, language).await?;

        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry::update(
                self.clock.now(),
                EntityType::Language,
                keys::LANGUAGE,
                None,
                &previous.as_str(),
                &language,
                None,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn service() -> SettingsService {
        SettingsService::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), "en")
    }

    #[tokio::test]
    async fn test_language_defaults() {
        let service = service();
        assert_eq!(service.get_language().await.unwrap(), "en");

        service.set_language("zh-CN").await.unwrap();
        assert_eq!(service.get_language().await.unwrap(), "zh-CN");
    }

    #[tokio::test]
    async fn test_settings_overwritten_not_merged() {
        let service = service();
        let first: AppSettings =
            serde_json::from_value(json!({"themeMode": "dark", "sound": "bell"})).unwrap();
        service.save_app_settings(&first).await.unwrap();

        let second: AppSettings = serde_json::from_value(json!({"themeMode": "light"})).unwrap();
        service.save_app_settings(&second).await.unwrap();

        let stored = service.get_app_settings().await.unwrap();
        assert_eq!(stored, second);
        assert!(stored.get("sound").is_none());
    }

    #[tokio::test]
    async fn test_audit_hides_push_encryption_key() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLogger::new(temp_dir.path().join("audit.log"));
        let service = service().with_audit(audit.clone());

        let settings: AppSettings = serde_json::from_value(json!({
            "encryptionConfig": {"algorithm": "AES128", "mode": "CBC", "key": "supersecretkey16"}
        }))
        .unwrap();
        service.save_app_settings(&settings).await.unwrap();

        assert_eq!(audit.read_all().unwrap().len(), 1);
        let contents = std::fs::read_to_string(audit.path()).unwrap();
        assert!(!contents.contains("supersecretkey16"));
    }

    #[tokio::test]
    async fn test_missing_settings_are_empty() {
        assert!(service().get_app_settings().await.unwrap().is_empty());
    }
}
