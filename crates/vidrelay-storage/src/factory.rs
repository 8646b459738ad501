#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use vidrelay_core::WorkerConfig;

/// Create the storage backend for `bucket` based on configuration.
///
/// With the local backend each bucket is a subdirectory of `LOCAL_STORAGE_PATH`.
pub async fn create_storage(config: &WorkerConfig, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let storage = S3Storage::new(
                bucket.to_string(),
                config.aws_region.clone(),
                config.s3_endpoint.clone(),
            )?;
            tracing::info!(bucket = %bucket, region = %config.aws_region, "S3 storage ready");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.as_ref().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let storage = LocalStorage::new(base_path.join(bucket)).await?;
            tracing::info!(path = %storage.base_path().display(), "Local storage ready");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
