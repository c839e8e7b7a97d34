//! Request-scoped temporary files.
//!
//! Every acquired source and every produced result is written to a file in
//! a per-request temp directory. The [`ResourceScope`] owns that directory
//! and records each resource so the pipeline can release all of them once,
//! whatever path the request took.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Handle to one temporary file inside a [`ResourceScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryResource {
    path: PathBuf,
    len: usize,
}

impl TemporaryResource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Acquire and release counts of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResourceCounts {
    pub acquired: usize,
    pub released: usize,
}

impl ResourceCounts {
    pub const fn balanced(self) -> bool {
        self.acquired == self.released
    }
}

/// Owner of a request's temporary files.
///
/// Dropping a scope that still holds resources removes its directory
/// without counting releases.
pub struct ResourceScope {
    /// Temp directory, removed on drop or on `release_all`
    dir: Option<TempDir>,
    live: Vec<TemporaryResource>,
    counts: ResourceCounts,
}

impl ResourceScope {
    /// Create a scope in `parent`, or the system temp dir.
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("pdf-ops-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("pdf-ops-").tempdir()?,
        };
        debug!("Created resource scope at {}", dir.path().display());
        Ok(Self {
            dir: Some(dir),
            live: Vec::new(),
            counts: ResourceCounts::default(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub const fn counts(&self) -> ResourceCounts {
        self.counts
    }

    /// Write `data` to a new resource named `label`.
    pub async fn create(&mut self, label: &str, data: &[u8]) -> Result<TemporaryResource> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| Error::Internal("resource scope already released".into()))?;
        let path = dir.path().join(format!("{label}_{}.bin", self.counts.acquired));

        tokio::fs::write(&path, data).await?;
        let resource = TemporaryResource {
            path,
            len: data.len(),
        };
        self.counts.acquired += 1;
        self.live.push(resource.clone());

        debug!("Acquired {} ({} bytes)", resource.path.display(), resource.len);
        Ok(resource)
    }

    pub async fn read(&self, resource: &TemporaryResource) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&resource.path).await?)
    }

    /// Release every live resource, then the directory.
    ///
    /// Failures are logged; each resource counts as released once.
    pub async fn release_all(&mut self) -> ResourceCounts {
        for resource in self.live.drain(..) {
            match tokio::fs::remove_file(&resource.path).await {
                Ok(()) => debug!("Released {}", resource.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("Resource {} was already gone", resource.path.display());
                }
                Err(e) => warn!("Failed to release {}: {}", resource.path.display(), e),
            }
            self.counts.released += 1;
        }

        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove resource scope {}: {}", path.display(), e);
            }
        }
        self.counts
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            warn!(
                "Resource scope dropped with {} unreleased resources",
                self.live.len()
            );
        }
    }
}
