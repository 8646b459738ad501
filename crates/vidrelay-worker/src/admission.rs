//! Admission control in front of the worker pool.
//!
//! `can_admit` then `submit` is a check-then-act without reservation: concurrent
//! dispatchers can overshoot the limit by at most the batches they submit at once.

use std::sync::Arc;

use vidrelay_core::models::Task;
use vidrelay_core::{AdmissionConfig, WorkerPool, WorkerPoolError};

pub struct AdmissionController {
    pool: Arc<dyn WorkerPool>,
    worker_class: String,
    concurrency_limit: usize,
    submit_batch_limit: usize,
}

impl AdmissionController {
    pub fn new(pool: Arc<dyn WorkerPool>, config: &AdmissionConfig) -> Self {
        Self::with_limits(
            pool,
            config.worker_class.clone(),
            config.concurrency_limit,
            config.submit_batch_limit,
        )
    }

    pub fn with_limits(
        pool: Arc<dyn WorkerPool>,
        worker_class: impl Into<String>,
        concurrency_limit: usize,
        submit_batch_limit: usize,
    ) -> Self {
        Self {
            pool,
            worker_class: worker_class.into(),
            concurrency_limit,
            submit_batch_limit: submit_batch_limit.max(1),
        }
    }

    /// Largest number of tasks handed to the pool in one call.
    pub fn submit_batch_limit(&self) -> usize {
        self.submit_batch_limit
    }

    /// True iff fewer than `concurrency_limit` workers of the managed class are running.
    #[tracing::instrument(skip(self), fields(worker_class = %self.worker_class))]
    pub async fn can_admit(&self) -> Result<bool, WorkerPoolError> {
        let active = self.pool.count_active(&self.worker_class).await?;
        let admit = active < self.concurrency_limit;
        tracing::debug!(
            active = active,
            limit = self.concurrency_limit,
            admit = admit,
            "Admission check"
        );
        Ok(admit)
    }

    /// Hand `tasks` to the pool in a single call.
    pub async fn submit(&self, tasks: &[Task]) -> Result<bool, WorkerPoolError> {
        self.pool.submit(tasks).await
    }
}
