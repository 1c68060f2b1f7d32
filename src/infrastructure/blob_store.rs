// Blob Store - opaque photo storage addressed by path

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Result of a best-effort removal; callers may inspect or ignore it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    Removed(String),
    Failed { path: String, reason: String },
}

impl Cleanup {
    pub fn is_removed(&self) -> bool {
        matches!(self, Cleanup::Removed(_))
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` to `path`, replacing any previous content
    async fn save(&self, bytes: &[u8], path: &str) -> AppResult<()>;

    /// Remove the blob at `path`
    async fn remove(&self, path: &str) -> AppResult<()>;

    /// Remove the blob at `path`; failures are logged and reported, never raised
    async fn remove_best_effort(&self, path: &str) -> Cleanup {
        match self.remove(path).await {
            Ok(()) => Cleanup::Removed(path.to_string()),
            Err(e) => {
                warn!("Best-effort removal of {} failed: {}", path, e);
                Cleanup::Failed {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Local filesystem blob store; paths are used as given
#[derive(Debug, Default)]
pub struct LocalBlobStore;

impl LocalBlobStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, bytes: &[u8], path: &str) -> AppResult<()> {
        // Create parent directories
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::BlobStoreError(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| AppError::BlobStoreError(format!("Failed to write {}: {}", path, e)))
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| AppError::BlobStoreError(format!("Failed to remove {}: {}", path, e)))
    }
}

/// In-process blob store, used by tests and tooling
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_removals: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose removals always fail
    pub fn failing_removals() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            fail_removals: true,
        }
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(path).cloned()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.blobs.lock().await.contains_key(path)
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save(&self, bytes: &[u8], path: &str) -> AppResult<()> {
        self.blobs
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        if self.fail_removals {
            return Err(AppError::BlobStoreError(format!(
                "Removal of {} refused",
                path
            )));
        }
        match self.blobs.lock().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(AppError::BlobStoreError(format!("No blob at {}", path))),
        }
    }
}
