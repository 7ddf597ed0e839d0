//! Engine configuration
//!
//! Identifies the producing installation in every container and selects
//! restore behavior. Persisted as JSON next to the store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::paths::BackupPaths;
use crate::error::BackupError;
use crate::storage::write_json_atomic;

/// How restored devices are written to the live list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// One edit or import per backup device, in backup order
    #[default]
    Sequential,
    /// Merge in memory, then a single replace-all write
    Atomic,
}

/// Producer metadata stamped into every container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEnvironment {
    pub version: String,
    pub run_id: String,
    pub user_agent: String,
}

/// Configuration for the backup engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Product name used in backup file names
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Application version written to containers
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Installation id, generated once and kept
    #[serde(default = "default_run_id")]
    pub run_id: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// How long a positive cloud authorization check is trusted
    #[serde(default = "default_cloud_auth_ttl_secs")]
    pub cloud_auth_ttl_secs: u64,

    #[serde(default)]
    pub merge_mode: MergeMode,

    /// Language reported when none was ever stored
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_product_name() -> String {
    "bark-sender".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_run_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_user_agent() -> String {
    format!(
        "bark-backup/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn default_cloud_auth_ttl_secs() -> u64 {
    300
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            product_name: default_product_name(),
            app_version: default_app_version(),
            run_id: default_run_id(),
            user_agent: default_user_agent(),
            cloud_auth_ttl_secs: default_cloud_auth_ttl_secs(),
            merge_mode: MergeMode::default(),
            default_language: default_language(),
        }
    }
}

impl BackupConfig {
    /// Producer metadata for new containers
    pub fn environment(&self) -> BackupEnvironment {
        BackupEnvironment {
            version: self.app_version.clone(),
            run_id: self.run_id.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Load the configuration, creating and saving defaults on first use
    ///
    /// Saving on first use pins the generated run id.
    pub fn load_or_create(paths: &BackupPaths) -> Result<Self, BackupError> {
        let config_path = paths.config_file();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| BackupError::Io(format!("Failed to read config file: {}", e)))?;

            let config: BackupConfig = serde_json::from_str(&contents)
                .map_err(|e| BackupError::Config(format!("Failed to parse config file: {}", e)))?;

            Ok(config)
        } else {
            let config = BackupConfig::default();
            config.save(paths)?;
            tracing::info!(run_id = %config.run_id, "created backup configuration");
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self, paths: &BackupPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;
        write_json_atomic(&paths.config_file(), self)
    }
}
