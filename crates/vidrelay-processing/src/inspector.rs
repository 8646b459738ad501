use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use vidrelay_core::models::{ContentMetadata, ValidationReport};
use vidrelay_core::PipelineError;

#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("Failed to run inspector: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Inspector exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Inspector timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to parse inspector output: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<InspectorError> for PipelineError {
    fn from(err: InspectorError) -> Self {
        PipelineError::Inspector(err.to_string())
    }
}

/// Probes a local media file.
///
/// A rejected file is a successful call with `success == false`; errors mean the
/// inspection itself could not be carried out.
#[async_trait]
pub trait ContentInspector: Send + Sync {
    async fn validate(&self, path: &Path) -> Result<ValidationReport, InspectorError>;

    async fn extract_metadata(&self, path: &Path) -> Result<ContentMetadata, InspectorError>;
}
