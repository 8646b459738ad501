use async_trait::async_trait;
use std::sync::Arc;

use vidrelay_core::constants::SUBMISSION_DECLINED;
use vidrelay_core::models::{Stage, StageField, StageRecord, StageStatus, Task};
use vidrelay_core::PipelineError;

use super::{is_terminal, parse_task};
use crate::batch::{log_item_error, should_redeliver, BatchHandler, BatchResponse};
use crate::context::PipelineContext;
use crate::queue::QueueMessage;

/// Feeds TRANSCODE tasks to the worker pool under admission control.
///
/// The batch is cut into sub-batches of at most `submit_batch_limit` tasks and admission
/// is checked once per sub-batch:
///
/// | admission | submit | ledger                       | redelivered |
/// |-----------|--------|------------------------------|-------------|
/// | false     | -      | untouched                    | yes         |
/// | true      | true   | accepted -> download, done   | no          |
/// | true      | false  | accepted HOLD                | yes         |
/// | error     | -      | accepted HOLD, error noted   | yes         |
pub struct DispatchHandler {
    ctx: Arc<PipelineContext>,
}

struct Pending<'a> {
    message: &'a QueueMessage,
    task: Task,
}

impl DispatchHandler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Parse and screen one message. `Ok(None)` means acknowledge without dispatching.
    ///
    /// A duplicate TRANSCODE for an asset already past `accepted` is acknowledged and
    /// dropped.
    async fn screen(&self, message: &QueueMessage) -> Result<Option<Task>, PipelineError> {
        let task = parse_task(message)?;
        let identity = task.identity();
        let ledger = self.ctx.ledger.as_ref();
        if is_terminal(ledger, &identity, self.name()).await? {
            return Ok(None);
        }

        if let Some(record) = ledger.get(&identity).await? {
            if !record.current_stage.awaits_dispatch() {
                tracing::info!(
                    task_id = %task.task_id,
                    owner_id = %identity.owner_id,
                    asset_id = %identity.asset_id,
                    current_stage = %record.current_stage,
                    "Asset already dispatched, dropping duplicate task"
                );
                return Ok(None);
            }
        }
        Ok(Some(task))
    }

    #[tracing::instrument(skip(self, chunk, response), fields(sub_batch = chunk.len()))]
    async fn dispatch_chunk(&self, chunk: &[Pending<'_>], response: &mut BatchResponse) {
        let admission = self.ctx.admission.as_ref();

        match admission.can_admit().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(tasks = chunk.len(), "Worker pool at capacity, deferring");
                for item in chunk {
                    response.push(item.message.message_id.clone());
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Admission check failed");
                self.hold_all(chunk, &e.to_string(), response).await;
                return;
            }
        }

        let tasks: Vec<Task> = chunk.iter().map(|p| p.task.clone()).collect();
        match admission.submit(&tasks).await {
            Ok(true) => {
                for item in chunk {
                    if let Err(e) = self.mark_submitted(&item.task).await {
                        log_item_error(self.name(), &item.message.message_id, &e);
                        if should_redeliver(&e) {
                            response.push(item.message.message_id.clone());
                        }
                    }
                }
            }
            Ok(false) => self.hold_all(chunk, SUBMISSION_DECLINED, response).await,
            Err(e) => {
                tracing::warn!(error = %e, tasks = tasks.len(), "Worker pool submission failed");
                self.hold_all(chunk, &e.to_string(), response).await;
            }
        }
    }

    async fn mark_submitted(&self, task: &Task) -> Result<(), PipelineError> {
        let identity = task.identity();
        self.ctx
            .ledger
            .record_stage_transition(
                &identity,
                Stage::Accepted,
                Stage::Download,
                StageRecord::completed(task.created_at),
            )
            .await?;
        tracing::info!(
            task_id = %task.task_id,
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            "Transcode task submitted"
        );
        Ok(())
    }

    async fn hold(&self, task: &Task, error: &str) -> Result<(), PipelineError> {
        let identity = task.identity();
        let ledger = self.ctx.ledger.as_ref();
        ledger
            .set_field(&identity, Stage::Accepted, StageField::Status(StageStatus::Hold))
            .await?;
        ledger
            .set_field(&identity, Stage::Accepted, StageField::Error(error.to_string()))
            .await?;
        Ok(())
    }

    /// Park every item of the chunk as HOLD and report it for redelivery.
    async fn hold_all(&self, chunk: &[Pending<'_>], error: &str, response: &mut BatchResponse) {
        for item in chunk {
            if let Err(e) = self.hold(&item.task, error).await {
                tracing::error!(
                    error = %e,
                    task_id = %item.task.task_id,
                    owner_id = %item.task.owner_id,
                    asset_id = %item.task.asset_id,
                    "Failed to record HOLD"
                );
            }
            response.push(item.message.message_id.clone());
        }
    }
}

#[async_trait]
impl BatchHandler for DispatchHandler {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    #[tracing::instrument(skip(self, messages), fields(handler = "dispatch", batch_size = messages.len()))]
    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        let mut response = BatchResponse::new();

        let screened =
            futures::future::join_all(messages.iter().map(|m| async move { (m, self.screen(m).await) }))
                .await;

        let mut pending = Vec::with_capacity(screened.len());
        for (message, result) in screened {
            match result {
                Ok(Some(task)) => pending.push(Pending { message, task }),
                Ok(None) => {}
                Err(e) => {
                    log_item_error(self.name(), &message.message_id, &e);
                    if should_redeliver(&e) {
                        response.push(message.message_id.clone());
                    }
                }
            }
        }

        for chunk in pending.chunks(self.ctx.admission.submit_batch_limit()) {
            self.dispatch_chunk(chunk, &mut response).await;
        }

        response
    }
}
