use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Information about a storage backend
#[derive(Debug, Clone)]
pub struct StorageInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Where identifiers resolve to (base URL, root directory, ...)
    pub location: String,
}

/// Object store holding sources and results.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait Storage: Send + Sync {
    fn info(&self) -> StorageInfo;

    /// Bytes stored under `id`.
    async fn fetch(&self, id: &str) -> Result<Bytes, StorageError>;

    /// Persist `data` under `id` and return a locator for it.
    async fn store(&self, id: &str, data: Bytes) -> Result<String, StorageError>;
}
