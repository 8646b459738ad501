use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};

use crate::traits::{Storage, StorageError, StorageResult};

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// `endpoint_url` points at an S3-compatible provider (e.g. "http://localhost:9000"
    /// for MinIO). Credentials come from the environment.
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let location = Path::from(key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes)
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let size = data.len();
        let location = Path::from(key);

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::debug!(bucket = %self.bucket, key = %key, size_bytes = size, "S3 upload successful");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Path::from(key);

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        let start = std::time::Instant::now();
        let location = Path::from(prefix.trim_end_matches('/'));

        // Listing pages through the bucket; each item is one object.
        let count = object_store::ObjectStore::list(&self.store, Some(&location))
            .try_fold(0u64, |n, _meta| async move { Ok(n + 1) })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, prefix = %prefix, "S3 list failed");
                StorageError::ListFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            count = count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 prefix counted"
        );

        Ok(count)
    }
}
