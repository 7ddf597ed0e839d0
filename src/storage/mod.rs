//! Platform storage and identity capabilities
//!
//! The engine never reaches for ambient platform singletons. Storage and
//! identity are injected as the [`KeyValueStore`] and [`IdentityProvider`]
//! traits, with in-memory and JSON-file implementations provided here.

pub mod file_io;
pub mod json_store;
pub mod memory;

pub use file_io::{read_json, write_json_atomic};
pub use json_store::JsonFileStore;
pub use memory::{MemoryIdentityProvider, MemoryStore};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{BackupError, BackupResult};

/// Well-known keys in the key-value namespace
pub mod keys {
    /// The device list
    pub const DEVICES: &str = "devices";
    /// Id of the default device
    pub const DEFAULT_DEVICE: &str = "default_device";
    /// Active UI language code
    pub const LANGUAGE: &str = "language";
    /// The application settings object
    pub const APP_SETTINGS: &str = "app_settings";
}

/// String-keyed JSON storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` if the key was never written
    async fn get(&self, key: &str) -> BackupResult<Option<Value>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Value) -> BackupResult<()>;

    /// Delete a key; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> BackupResult<()>;
}

/// OAuth-style token access for the cloud adapter
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the current token; `interactive` allows prompting the user
    async fn get_auth_token(&self, interactive: bool) -> BackupResult<Option<String>>;

    /// Revoke a token previously returned by `get_auth_token`
    async fn revoke_token(&self, token: &str) -> BackupResult<()>;
}

/// Read and deserialize a typed value
pub async fn get_typed<T>(store: &dyn KeyValueStore, key: &str) -> BackupResult<Option<T>>
where
    T: DeserializeOwned,
{
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BackupError::Storage(format!("Malformed value under '{}': {}", key, e))),
    }
}

/// Serialize and write a typed value
pub async fn set_typed<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> BackupResult<()>
where
    T: Serialize + ?Sized + Sync,
{
    let value = serde_json::to_value(value)
        .map_err(|e| BackupError::Json(format!("Failed to serialize '{}': {}", key, e)))?;
    store.set(key, value).await
}
