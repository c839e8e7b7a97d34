mod dir;
mod http;
mod memory;
mod traits;

pub use dir::DirStorage;
pub use http::HttpStorage;
pub use memory::{MemoryStorage, StorageCalls};
pub use traits::{Storage, StorageInfo};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Create a storage backend from configuration
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::Http => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| Error::StorageInit("http storage needs a base_url".into()))?;
            Arc::new(HttpStorage::new(
                base_url,
                config.api_key.clone(),
                config.bucket.clone(),
                config.retry_count,
                config.retry_delay_ms,
                config.timeout_secs,
            )?)
        }
        StorageBackend::Directory => {
            let root = config
                .root_dir
                .clone()
                .ok_or_else(|| Error::StorageInit("directory storage needs a root_dir".into()))?;
            Arc::new(DirStorage::new(root)?)
        }
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    Ok(storage)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use bytes::Bytes;
    use tempfile::TempDir;

    #[test]
    fn test_create_requires_backend_settings() {
        let config = StorageConfig::default();
        assert!(matches!(create_storage(&config), Err(Error::StorageInit(_))));

        let config = StorageConfig {
            backend: StorageBackend::Directory,
            ..StorageConfig::default()
        };
        assert!(matches!(create_storage(&config), Err(Error::StorageInit(_))));
    }

    #[test]
    fn test_create_memory() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let storage = create_storage(&config).map(|s| s.info().name).ok();
        assert_eq!(storage, Some("memory"));
    }

    #[tokio::test]
    async fn test_directory_backend_through_trait_object() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Directory,
            root_dir: Some(dir.path().to_path_buf()),
            ..StorageConfig::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.info().name, "directory");

        let locator = storage.store("a/b.pdf", Bytes::from_static(b"%PDF")).await.unwrap();
        assert!(locator.ends_with("b.pdf"));
        assert_eq!(storage.fetch("a/b.pdf").await.unwrap().as_ref(), b"%PDF");

        let missing: std::result::Result<Bytes, StorageError> = storage.fetch("absent.pdf").await;
        assert_eq!(missing, Err(StorageError::NotFound("absent.pdf".into())));
    }
}
