use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::traits::{Storage, StorageError, StorageResult};

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the directory.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a path below the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }

        let relative = Path::new(storage_key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }

        Ok(self.base_path.join(relative))
    }

    fn not_found_or(key: &str, err: std::io::Error, wrap: fn(String) -> StorageError) -> StorageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            wrap(err.to_string())
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::not_found_or(key, e, StorageError::DownloadFailed))?;

        tracing::debug!(key = %key, size_bytes = data.len(), "Local read successful");
        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        }

        fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::debug!(key = %key, size_bytes = data.len(), "Local write successful");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting a missing object is not an error, as with S3.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        let root = self.key_to_path(prefix.trim_end_matches('/'))?;

        let mut count = 0u64;
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}
