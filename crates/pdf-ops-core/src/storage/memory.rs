use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::traits::{Storage, StorageInfo};
use crate::error::StorageError;

/// Counts of calls made against a [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageCalls {
    pub fetches: usize,
    pub stores: usize,
}

/// In-process object map.
///
/// Failures can be injected per identifier for fetches and globally for
/// stores.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
    fetch_failures: RwLock<HashMap<String, StorageError>>,
    store_failure: RwLock<Option<StorageError>>,
    fetches: AtomicUsize,
    stores: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator returned for a stored identifier.
    pub fn locator(id: &str) -> String {
        format!("memory://{id}")
    }

    pub async fn insert(&self, id: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.write().await.insert(id.into(), data.into());
    }

    pub async fn get(&self, id: &str) -> Option<Bytes> {
        self.objects.read().await.get(id).cloned()
    }

    /// Identifiers currently stored, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.objects.read().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Make every fetch of `id` fail with `error`.
    pub async fn fail_fetch(&self, id: impl Into<String>, error: StorageError) {
        self.fetch_failures.write().await.insert(id.into(), error);
    }

    /// Make every store fail with `error`.
    pub async fn fail_stores(&self, error: StorageError) {
        *self.store_failure.write().await = Some(error);
    }

    pub fn calls(&self) -> StorageCalls {
        StorageCalls {
            fetches: self.fetches.load(Ordering::SeqCst),
            stores: self.stores.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            name: "memory",
            location: "memory://".to_string(),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Bytes, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fetch_failures.read().await.get(id) {
            return Err(error.clone());
        }
        self.get(id)
            .await
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn store(&self, id: &str, data: Bytes) -> Result<String, StorageError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.store_failure.read().await.clone() {
            return Err(error);
        }
        self.insert(id, data).await;
        Ok(Self::locator(id))
    }
}
