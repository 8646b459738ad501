use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use vidrelay_core::models::{ObjectEventRecord, Stage, StageRecord, TaskType, WorkerType};
use vidrelay_core::{create_task, AssetIdentity, PipelineError};

use super::{is_terminal, parse_notification};
use crate::batch::{merge_results, process_each, BatchHandler, BatchResponse};
use crate::context::PipelineContext;
use crate::queue::{enqueue_task, QueueMessage};

/// Turns upload notifications into ledger records and VALIDATION tasks.
///
/// A redelivered notification finds the record already there and re-sends the task;
/// the duplicate is tolerated downstream.
pub struct IntakeHandler {
    ctx: Arc<PipelineContext>,
}

impl IntakeHandler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    async fn handle_message(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        let notification = parse_notification(message)?;
        if notification.records.is_empty() {
            tracing::debug!(message_id = %message.message_id, "Notification without records");
            return Ok(());
        }

        let results = join_all(notification.records.iter().map(|r| self.handle_record(r))).await;
        merge_results(results)
    }

    #[tracing::instrument(skip(self, record), fields(bucket = %record.s3.bucket.name, key = %record.s3.object.key))]
    async fn handle_record(&self, record: &ObjectEventRecord) -> Result<(), PipelineError> {
        let key = record.decoded_key();
        let identity = AssetIdentity::from_key(&key)?;
        let ledger = self.ctx.ledger.as_ref();

        let created = ledger.initialize(&identity).await?;
        if !created && is_terminal(ledger, &identity, self.name()).await? {
            return Ok(());
        }

        let created_at = ledger.get_created_at(&identity).await?;
        let task = create_task(
            &identity,
            TaskType::Validation,
            key.as_str(),
            key.as_str(),
            WorkerType::Validator,
        );
        enqueue_task(self.ctx.validation_queue.as_ref(), &task).await?;

        ledger
            .record_stage_transition(
                &identity,
                Stage::Upload,
                Stage::Validation,
                StageRecord::completed(created_at),
            )
            .await?;

        tracing::info!(
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            task_id = %task.task_id,
            first_delivery = created,
            "Upload accepted for validation"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for IntakeHandler {
    fn name(&self) -> &'static str {
        "intake"
    }

    #[tracing::instrument(skip(self, messages), fields(handler = "intake", batch_size = messages.len()))]
    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        process_each(self.name(), messages, |m| self.handle_message(m)).await
    }
}
