//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use vidrelay_core::PipelineError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => PipelineError::MalformedKey(key),
            // A freshly-notified object can lag behind its notification; retry.
            other => PipelineError::Storage(other.to_string()),
        }
    }
}

/// Object store addressed by string keys.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Number of objects whose key starts with `{prefix}/`.
    async fn count(&self, prefix: &str) -> StorageResult<u64>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
