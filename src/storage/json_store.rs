//! Key-value store persisted to a single JSON file
//!
//! The whole namespace is one JSON object; each `set` rewrites the file
//! atomically. The cached copy only changes once the file write succeeds.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::BackupResult;

use super::file_io::{read_json, write_json_atomic};
use super::KeyValueStore;

/// A key-value store backed by a JSON file
pub struct JsonFileStore {
    path: PathBuf,
    /// Loaded lazily on first access
    data: Mutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    /// Create a store for the given file
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: Mutex::new(None),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Drop the in-memory copy so the next access re-reads the file
    pub async fn reload(&self) {
        *self.data.lock().await = None;
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> BackupResult<Option<Value>> {
        let mut data = self.data.lock().await;
        if data.is_none() {
            *data = Some(read_json(&self.path)?);
        }
        Ok(data.as_ref().and_then(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> BackupResult<()> {
        let mut data = self.data.lock().await;
        let mut map = match data.as_ref() {
            Some(map) => map.clone(),
            None => read_json(&self.path)?,
        };

        map.insert(key.to_string(), value);
        write_json_atomic(&self.path, &map)?;
        *data = Some(map);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackupResult<()> {
        let mut data = self.data.lock().await;
        let mut map = match data.as_ref() {
            Some(map) => map.clone(),
            None => read_json(&self.path)?,
        };

        if map.remove(key).is_some() {
            write_json_atomic(&self.path, &map)?;
        }
        *data = Some(map);
        Ok(())
    }
}
