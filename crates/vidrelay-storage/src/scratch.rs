//! Scratch space for objects that an external tool needs to read from disk.
//!
//! Each write gets its own uniquely named file, and cleanup removes only that file, so
//! concurrent handlers sharing the directory never delete each other's inputs.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

/// A file owned by one unit of work.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchSpace {
    pub async fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create scratch directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a new file whose name ends with the basename of `key`.
    pub async fn write(&self, key: &str, data: &Bytes) -> StorageResult<ScratchFile> {
        let basename: String = key
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("{}-{}", Uuid::new_v4(), basename));

        fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), size_bytes = data.len(), "Scratch file written");

        Ok(ScratchFile { path })
    }
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Failures are logged, never returned.
    pub async fn cleanup(self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                path = %self.path.display(),
                "Failed to remove scratch file"
            ),
        }
    }
}
