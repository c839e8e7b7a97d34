use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::{Storage, StorageInfo};
use crate::error::{Error, StorageError};
use crate::util::is_contained_relative_path;

/// Storage rooted at a local directory.
///
/// Identifiers are relative paths below the root; locators are the
/// absolute paths of stored files.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> crate::error::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::StorageInit(format!("failed to create storage root {}: {e}", root.display()))
        })?;
        let root = root.canonicalize().map_err(|e| {
            Error::StorageInit(format!("failed to resolve storage root {}: {e}", root.display()))
        })?;

        debug!("Opened directory storage at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(id);
        if !is_contained_relative_path(relative) {
            return Err(StorageError::Transport(format!(
                "identifier escapes the storage root: {id}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for DirStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            name: "directory",
            location: self.root.display().to_string(),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(StorageError::Transport(format!("{}: {e}", path.display()))),
        }
    }

    async fn store(&self, id: &str, data: Bytes) -> Result<String, StorageError> {
        let path = self.path_for(id)?;
        let transport = |e: io::Error| StorageError::Transport(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(transport)?;
        }
        tokio::fs::write(&path, &data).await.map_err(transport)?;

        debug!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_then_fetch() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path()).unwrap();

        let locator = storage
            .store("results/out.pdf", Bytes::from_static(b"%PDF-1.5"))
            .await
            .unwrap();
        assert!(locator.ends_with("out.pdf"));
        assert!(Path::new(&locator).is_absolute());

        let data = storage.fetch("results/out.pdf").await.unwrap();
        assert_eq!(data.as_ref(), b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path()).unwrap();
        let err = storage.fetch("absent.pdf").await.unwrap_err();
        assert_eq!(err, StorageError::NotFound("absent.pdf".into()));
    }

    #[tokio::test]
    async fn test_rejects_escaping_identifiers() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path().join("root")).unwrap();
        assert!(storage.fetch("../secret.pdf").await.is_err());
        assert!(storage.fetch("/etc/passwd").await.is_err());
        assert!(storage.store("a/../../x.pdf", Bytes::new()).await.is_err());
    }
}
