//! Cloud object storage source
//!
//! [`CloudStorage`] is the surface the manager uploads to and restores from.
//! Authorization is an opaque gate; a positive check is cached for a TTL by
//! an [`AuthorizationCache`] owned by each adapter instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::error::{BackupError, BackupResult};
use crate::storage::IdentityProvider;

use super::container::is_encrypted_file_name;

/// A backup file stored in the cloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

impl FileMeta {
    /// Whether the file name flags an encrypted backup
    pub fn is_encrypted(&self) -> bool {
        is_encrypted_file_name(&self.name)
    }
}

/// Remote storage for backup files
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Check access without prompting the user
    async fn is_authorized(&self) -> BackupResult<bool>;

    /// Ask the user for access; `false` if they decline
    async fn authorize(&self) -> BackupResult<bool>;

    /// Give up access
    async fn revoke(&self) -> BackupResult<()>;

    /// Store a file and return its id
    async fn upload_backup(&self, name: &str, content: &str) -> BackupResult<String>;

    async fn list_backups(&self) -> BackupResult<Vec<FileMeta>>;

    async fn download_backup(&self, id: &str) -> BackupResult<String>;

    async fn delete_backup(&self, id: &str) -> BackupResult<()>;

    async fn clear_all_backups(&self) -> BackupResult<()>;
}

/// Remembers a successful authorization check for a limited time
pub struct AuthorizationCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    checked_at: Mutex<Option<DateTime<Utc>>>,
}

impl AuthorizationCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            checked_at: Mutex::new(None),
        }
    }

    /// Whether a positive check happened within the TTL
    pub fn is_fresh(&self) -> bool {
        let checked_at = self.checked_at.lock().unwrap_or_else(|e| e.into_inner());
        (*checked_at).map_or(false, |at| self.clock.now() - at < self.ttl)
    }

    /// Record a positive check now
    pub fn mark_authorized(&self) {
        let mut checked_at = self.checked_at.lock().unwrap_or_else(|e| e.into_inner());
        *checked_at = Some(self.clock.now());
    }

    pub fn invalidate(&self) {
        let mut checked_at = self.checked_at.lock().unwrap_or_else(|e| e.into_inner());
        *checked_at = None;
    }
}

struct StoredFile {
    meta: FileMeta,
    content: String,
}

/// Cloud storage held in memory, gated by an identity provider
pub struct MemoryCloudStorage {
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    auth_cache: AuthorizationCache,
    files: RwLock<Vec<StoredFile>>,
    next_id: AtomicU64,
}

impl MemoryCloudStorage {
    pub fn new(identity: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>, auth_ttl: Duration) -> Self {
        Self {
            identity,
            auth_cache: AuthorizationCache::new(clock.clone(), auth_ttl),
            clock,
            files: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    async fn ensure_authorized(&self) -> BackupResult<()> {
        if self.is_authorized().await? {
            Ok(())
        } else {
            Err(BackupError::Unauthorized)
        }
    }
}

#[async_trait]
impl CloudStorage for MemoryCloudStorage {
    async fn is_authorized(&self) -> BackupResult<bool> {
        if self.auth_cache.is_fresh() {
            return Ok(true);
        }

        let authorized = self.identity.get_auth_token(false).await?.is_some();
        if authorized {
            self.auth_cache.mark_authorized();
        }
        Ok(authorized)
    }

    async fn authorize(&self) -> BackupResult<bool> {
        let authorized = self.identity.get_auth_token(true).await?.is_some();
        if authorized {
            self.auth_cache.mark_authorized();
        } else {
            self.auth_cache.invalidate();
        }
        tracing::debug!(authorized, "cloud authorization requested");
        Ok(authorized)
    }

    async fn revoke(&self) -> BackupResult<()> {
        self.auth_cache.invalidate();
        if let Some(token) = self.identity.get_auth_token(false).await? {
            self.identity.revoke_token(&token).await?;
        }
        Ok(())
    }

    async fn upload_backup(&self, name: &str, content: &str) -> BackupResult<String> {
        self.ensure_authorized().await?;

        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let meta = FileMeta {
            id: id.clone(),
            name: name.to_string(),
            created_time: self.clock.now(),
            size: content.len() as u64,
        };
        self.files.write().await.push(StoredFile {
            meta,
            content: content.to_string(),
        });

        Ok(id)
    }

    async fn list_backups(&self) -> BackupResult<Vec<FileMeta>> {
        self.ensure_authorized().await?;
        Ok(self
            .files
            .read()
            .await
            .iter()
            .map(|f| f.meta.clone())
            .collect())
    }

    async fn download_backup(&self, id: &str) -> BackupResult<String> {
        self.ensure_authorized().await?;
        self.files
            .read()
            .await
            .iter()
            .find(|f| f.meta.id == id)
            .map(|f| f.content.clone())
            .ok_or_else(|| BackupError::backup_not_found(id))
    }

    async fn delete_backup(&self, id: &str) -> BackupResult<()> {
        self.ensure_authorized().await?;
        let mut files = self.files.write().await;
        let position = files
            .iter()
            .position(|f| f.meta.id == id)
            .ok_or_else(|| BackupError::backup_not_found(id))?;
        files.remove(position);
        Ok(())
    }

    async fn clear_all_backups(&self) -> BackupResult<()> {
        self.ensure_authorized().await?;
        self.files.write().await.clear();
        Ok(())
    }
}
