//! End-to-end backup and restore through the public API

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use bark_backup::backup::{
    build_container, read_backup_file, write_backup_file, BackupContainer, BuildOptions,
    RestoreEngine, ENCRYPTED_MARKER,
};
use bark_backup::clock::ManualClock;
use bark_backup::config::BackupEnvironment;
use bark_backup::models::{Device, DeviceId, Snapshot, ThemeMode};
use bark_backup::services::{DeviceService, SettingsService, UiNotifier};
use bark_backup::storage::MemoryStore;
use bark_backup::{BackupError, RestoreFailure};

#[derive(Default)]
struct ThemeRecorder {
    themes: Mutex<Vec<ThemeMode>>,
}

#[async_trait]
impl UiNotifier for ThemeRecorder {
    async fn apply_theme(&self, mode: ThemeMode) {
        self.themes.lock().unwrap().push(mode);
    }

    async fn settings_changed(&self) {}
}

struct LiveState {
    engine: RestoreEngine,
    devices: DeviceService,
    settings: SettingsService,
    ui: Arc<ThemeRecorder>,
}

fn empty_live_state() -> LiveState {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
    ));
    let devices = DeviceService::new(store.clone(), clock.clone());
    let settings = SettingsService::new(store, clock.clone(), "en");
    let ui = Arc::new(ThemeRecorder::default());
    let engine = RestoreEngine::new(devices.clone(), settings.clone(), ui.clone(), clock);
    LiveState {
        engine,
        devices,
        settings,
        ui,
    }
}

fn phone_snapshot() -> Snapshot {
    let phone: Device = serde_json::from_value(json!({
        "id": "1",
        "alias": "Phone",
        "apiURL": "https://api.day.app/phonekey/"
    }))
    .unwrap();

    Snapshot {
        devices: vec![phone],
        default_device_id: "1".into(),
        app_settings: serde_json::from_value(json!({"themeMode": "dark"})).unwrap(),
        language: "en".into(),
    }
}

fn encrypted_phone_backup() -> BackupContainer {
    let env = BackupEnvironment {
        version: "1.0.0".into(),
        run_id: "install-1".into(),
        user_agent: "integration-test".into(),
    };
    build_container(
        &phone_snapshot(),
        &BuildOptions::encrypted("abc123", None),
        &env,
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn encrypted_backup_restores_into_empty_state() {
    let container = encrypted_phone_backup();
    let wire = serde_json::to_value(&container).unwrap();
    assert_eq!(wire["encrypted"], true);
    assert!(wire.get("passwordHint").is_none());
    assert!(wire.get("data").is_none());

    let live = empty_live_state();
    let report = live
        .engine
        .restore(&container, Some("abc123"))
        .await
        .unwrap();
    assert!(report.is_clean());

    let devices = live.devices.get_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].alias, "Phone");
    assert_eq!(
        live.devices.get_default_device_id().await.unwrap(),
        Some(DeviceId::new("1"))
    );
    assert_eq!(*live.ui.themes.lock().unwrap(), vec![ThemeMode::Dark]);
    assert_eq!(live.settings.get_language().await.unwrap(), "en");
}

#[tokio::test]
async fn wrong_password_leaves_state_untouched() {
    let container = encrypted_phone_backup();
    let live = empty_live_state();

    let err = live
        .engine
        .restore(&container, Some("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BackupError::RestoreFailed(RestoreFailure::DecryptFailed)
    ));
    assert_eq!(
        err.to_string(),
        "Restore failed: Wrong password or corrupted file"
    );
    assert!(live.devices.get_devices().await.unwrap().is_empty());
    assert_eq!(live.devices.get_default_device_id().await.unwrap(), None);
    assert!(live.settings.get_app_settings().await.unwrap().is_empty());
    assert!(live.ui.themes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn encrypted_file_round_trip_keeps_marker() {
    let temp_dir = TempDir::new().unwrap();
    let container = encrypted_phone_backup();

    let path = write_backup_file(temp_dir.path(), &container, "bark-sender").unwrap();
    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.contains(ENCRYPTED_MARKER));
    assert_eq!(name, "bark-sender-backup-2024-03-09-[encrypted].json");

    let read = read_backup_file(&path).unwrap();
    assert_eq!(read, container);

    let live = empty_live_state();
    live.engine.restore(&read, Some("abc123")).await.unwrap();
    assert_eq!(live.devices.get_devices().await.unwrap().len(), 1);
}

#[tokio::test]
async fn tampered_file_is_a_decrypt_failure() {
    let container = encrypted_phone_backup();
    let mut wire = serde_json::to_value(&container).unwrap();

    let data = wire["encryptedData"].as_str().unwrap().to_string();
    let flipped = if data.starts_with('A') { "B" } else { "A" };
    wire["encryptedData"] = json!(format!("{}{}", flipped, &data[1..]));

    let tampered = bark_backup::backup::validate_container(&wire).unwrap();
    let live = empty_live_state();
    let err = live
        .engine
        .restore(&tampered, Some("abc123"))
        .await
        .unwrap_err();
    assert!(err.is_decrypt_failure());
}
