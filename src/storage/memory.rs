//! In-memory platform capabilities
//!
//! Stand-ins for browser storage and identity, used by tests and by hosts
//! that keep state elsewhere.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{BackupError, BackupResult};

use super::{IdentityProvider, KeyValueStore};

/// A key-value store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with entries
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            data: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BackupResult<Option<Value>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> BackupResult<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackupResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

/// An identity provider that hands out a fixed token once granted
#[derive(Debug)]
pub struct MemoryIdentityProvider {
    /// Token issued when the user consents
    issued_token: String,
    /// Whether an interactive prompt would be accepted
    consent: bool,
    granted: RwLock<Option<String>>,
}

impl MemoryIdentityProvider {
    /// Create a provider; `consent` decides the outcome of interactive prompts
    pub fn new(issued_token: impl Into<String>, consent: bool) -> Self {
        Self {
            issued_token: issued_token.into(),
            consent,
            granted: RwLock::new(None),
        }
    }

    /// Create a provider that is already granted
    pub fn granted(issued_token: impl Into<String>) -> Self {
        let token = issued_token.into();
        Self {
            issued_token: token.clone(),
            consent: true,
            granted: RwLock::new(Some(token)),
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_auth_token(&self, interactive: bool) -> BackupResult<Option<String>> {
        let mut granted = self.granted.write().await;
        if granted.is_none() && interactive && self.consent {
            *granted = Some(self.issued_token.clone());
        }
        Ok(granted.clone())
    }

    async fn revoke_token(&self, token: &str) -> BackupResult<()> {
        let mut granted = self.granted.write().await;
        match granted.as_deref() {
            Some(current) if current == token => {
                *granted = None;
                Ok(())
            }
            _ => Err(BackupError::Unauthorized),
        }
    }
}
