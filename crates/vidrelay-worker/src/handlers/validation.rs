use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use vidrelay_core::models::{MetadataUpdate, Stage, StageRecord, Task, TaskType, WorkerType};
use vidrelay_core::{create_task, AssetIdentity, PipelineError};

use super::{complete_stage, is_terminal, parse_task};
use crate::batch::{process_each, BatchHandler, BatchResponse};
use crate::context::PipelineContext;
use crate::queue::{enqueue_task, QueueMessage};

/// Error recorded on the validation stage when the inspector rejects the upload.
const REJECTED_MESSAGE: &str = "Content failed validation";

/// Runs the content inspector over an upload and records the verdict.
///
/// Accepted uploads advance Validation -> Metadata -> Accepted and produce a TRANSCODE
/// task. Rejected ones end in the `rejected` stage with the critical flag set.
pub struct ValidationHandler {
    ctx: Arc<PipelineContext>,
}

impl ValidationHandler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(skip(self, message), fields(message_id = %message.message_id))]
    async fn handle_message(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        let task = parse_task(message)?;
        let identity = AssetIdentity::from_key(&task.input_key)?;

        if is_terminal(self.ctx.ledger.as_ref(), &identity, self.name()).await? {
            return Ok(());
        }

        let data = self.ctx.transport.get(&task.input_key).await?;
        let file = self.ctx.scratch.write(&task.input_key, &data).await?;
        drop(data);

        let result = self.inspect(&identity, &task, file.path()).await;
        file.cleanup().await;
        result
    }

    async fn inspect(
        &self,
        identity: &AssetIdentity,
        task: &Task,
        path: &Path,
    ) -> Result<(), PipelineError> {
        let ledger = self.ctx.ledger.as_ref();
        let validation_start = task.created_at;

        let report = self.ctx.inspector.validate(path).await?;
        ledger
            .write_metadata(identity, MetadataUpdate::Basic(report.basic))
            .await?;
        ledger
            .write_metadata(identity, MetadataUpdate::Stream(report.stream))
            .await?;

        if !report.success {
            ledger
                .record_stage_transition(
                    identity,
                    Stage::Validation,
                    Stage::Rejected,
                    StageRecord::failed(validation_start, REJECTED_MESSAGE),
                )
                .await?;
            complete_stage(ledger, identity, Stage::Rejected, validation_start).await?;
            ledger.mark_critical_failure(identity).await?;

            tracing::warn!(
                owner_id = %identity.owner_id,
                asset_id = %identity.asset_id,
                "Upload rejected by content validation"
            );
            return Ok(());
        }

        let metadata_start = Utc::now();
        let content = self.ctx.inspector.extract_metadata(path).await?;
        ledger
            .write_metadata(identity, MetadataUpdate::Technical(content.technical))
            .await?;
        ledger
            .write_metadata(identity, MetadataUpdate::Quality(content.quality))
            .await?;

        ledger
            .record_stage_transition(
                identity,
                Stage::Validation,
                Stage::Metadata,
                StageRecord::completed(validation_start),
            )
            .await?;
        ledger
            .record_stage_transition(
                identity,
                Stage::Metadata,
                Stage::Accepted,
                StageRecord::completed(metadata_start),
            )
            .await?;
        complete_stage(ledger, identity, Stage::Accepted, metadata_start).await?;

        let transcode = create_task(
            identity,
            TaskType::Transcode,
            task.input_key.as_str(),
            identity.prefix(),
            WorkerType::Processor,
        );
        enqueue_task(self.ctx.dispatch_queue.as_ref(), &transcode).await?;

        tracing::info!(
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            task_id = %transcode.task_id,
            "Upload accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for ValidationHandler {
    fn name(&self) -> &'static str {
        "validation"
    }

    #[tracing::instrument(skip(self, messages), fields(handler = "validation", batch_size = messages.len()))]
    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        process_each(self.name(), messages, |m| self.handle_message(m)).await
    }
}
