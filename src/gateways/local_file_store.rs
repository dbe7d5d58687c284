//! # Local File Store
//!
//! File-store adapter over a locally mounted tree (an SFTP mount or a
//! staging directory). Remote paths are resolved under `root`; `..`
//! segments are rejected.

use super::paths::normalize_remote_path;
use super::traits::FileStoreGateway;
use crate::error::{RequestError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, remote_path: &str) -> Result<PathBuf> {
        let normalized = normalize_remote_path(remote_path);
        if normalized.split('/').any(|segment| segment == "..") {
            return Err(RequestError::validation(format!(
                "remote path escapes the file store root: {remote_path}"
            )));
        }
        Ok(self.root.join(normalized.trim_start_matches('/')))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStoreGateway for LocalFileStore {
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let source = self.resolve(remote_path)?;
        Self::ensure_parent(local_path).await?;
        let bytes = tokio::fs::copy(&source, local_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RequestError::not_found(remote_path.to_string())
            } else {
                RequestError::from(e)
            }
        })?;
        debug!(remote = %remote_path, local = %local_path.display(), bytes, "Fetched file");
        Ok(bytes)
    }

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let target = self.resolve(remote_path)?;
        Self::ensure_parent(&target).await?;
        tokio::fs::copy(local_path, &target).await?;
        debug!(remote = %remote_path, local = %local_path.display(), "Put file");
        Ok(())
    }

    async fn exists(&self, remote_path: &str) -> Result<bool> {
        let target = self.resolve(remote_path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }

    async fn list(&self, remote_dir: &str) -> Result<Vec<String>> {
        let dir = self.resolve(remote_dir)?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RequestError::not_found(remote_dir.to_string())
            } else {
                RequestError::from(e)
            }
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        debug!(remote = %remote_dir, files = names.len(), "Listed directory");
        Ok(names)
    }
}
