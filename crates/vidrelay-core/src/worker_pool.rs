//! Worker pool seam.
//!
//! The pool runs the transcoding containers. The pipeline only ever asks how many
//! workers of a class are running and hands it batches of tasks.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::Task;

#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    #[error("Worker pool request failed: {0}")]
    Transport(String),

    #[error("Worker pool returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid worker pool response: {0}")]
    InvalidResponse(String),
}

impl From<WorkerPoolError> for PipelineError {
    fn from(err: WorkerPoolError) -> Self {
        PipelineError::WorkerPool(err.to_string())
    }
}

/// External, capacity-constrained pool of transcoding workers.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Number of workers of `class` currently running.
    async fn count_active(&self, class: &str) -> Result<usize, WorkerPoolError>;

    /// Submit a batch in one call. `Ok(false)` means the pool declined the submission.
    async fn submit(&self, tasks: &[Task]) -> Result<bool, WorkerPoolError>;
}
