use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use vidrelay_core::constants::COUNT_MISMATCH;
use vidrelay_core::models::{DistributionUrls, MetadataUpdate, ObjectEventRecord, Stage, StageRecord};
use vidrelay_core::{AssetIdentity, ErrorMetadata, PipelineError};

use super::{is_terminal, parse_notification};
use crate::batch::{merge_results, process_each, BatchHandler, BatchResponse};
use crate::context::PipelineContext;
use crate::queue::QueueMessage;

/// Reconciles transcoder output against the expected object count and publishes the
/// distribution URLs.
///
/// Triggered by the completion marker the transcoder writes under the asset prefix.
pub struct CompletionHandler {
    ctx: Arc<PipelineContext>,
}

impl CompletionHandler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    async fn handle_message(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        let notification = parse_notification(message)?;
        let results = join_all(notification.records.iter().map(|r| self.handle_record(r))).await;
        merge_results(results)
    }

    #[tracing::instrument(skip(self, record), fields(key = %record.s3.object.key))]
    async fn handle_record(&self, record: &ObjectEventRecord) -> Result<(), PipelineError> {
        let identity = AssetIdentity::from_key(&record.decoded_key())?;
        let ledger = self.ctx.ledger.as_ref();

        if is_terminal(ledger, &identity, self.name()).await? {
            return Ok(());
        }

        let started = Utc::now();
        match self.reconcile(&identity, started).await {
            Ok(()) => Ok(()),
            Err(e) if !e.is_recoverable() => Err(e),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    owner_id = %identity.owner_id,
                    asset_id = %identity.asset_id,
                    "Completion failed"
                );
                ledger
                    .record_stage_transition(
                        &identity,
                        Stage::PostProcessingValidation,
                        Stage::Completion,
                        StageRecord::failed(started, e.to_string()),
                    )
                    .await?;
                ledger.mark_critical_failure(&identity).await?;
                Ok(())
            }
        }
    }

    async fn reconcile(
        &self,
        identity: &AssetIdentity,
        started: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let ledger = self.ctx.ledger.as_ref();

        let expected = ledger.expected_output_count(identity).await?;
        let stored = self.ctx.content.count(&identity.prefix()).await?;
        let actual = stored.saturating_sub(self.ctx.completion_marker_objects);

        let matches = expected.is_some_and(|n| u64::try_from(n).ok() == Some(actual));
        if !matches {
            tracing::warn!(
                owner_id = %identity.owner_id,
                asset_id = %identity.asset_id,
                expected = ?expected,
                actual = actual,
                "Output count mismatch"
            );
            ledger
                .record_stage_transition(
                    identity,
                    Stage::PostProcessingValidation,
                    Stage::Completion,
                    StageRecord::hold(started, COUNT_MISMATCH),
                )
                .await?;
            ledger.mark_critical_failure(identity).await?;
            return Ok(());
        }

        ledger
            .record_stage_transition(
                identity,
                Stage::PostProcessingValidation,
                Stage::Completion,
                StageRecord::completed(started),
            )
            .await?;

        let completion_start = Utc::now();
        let urls = DistributionUrls::generate(
            &self.ctx.cdn_domain,
            &identity.owner_id,
            &identity.asset_id,
        );
        let finished = match ledger
            .write_metadata(identity, MetadataUpdate::Distribution(urls))
            .await
        {
            Ok(_) => StageRecord::completed(completion_start),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    owner_id = %identity.owner_id,
                    asset_id = %identity.asset_id,
                    "Failed to write distribution URLs"
                );
                StageRecord::hold(completion_start, e.to_string())
            }
        };

        ledger
            .record_stage_transition(identity, Stage::Completion, Stage::Finished, finished)
            .await?;

        tracing::info!(
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            outputs = actual,
            "Asset finished"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for CompletionHandler {
    fn name(&self) -> &'static str {
        "completion"
    }

    #[tracing::instrument(skip(self, messages), fields(handler = "completion", batch_size = messages.len()))]
    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        process_each(self.name(), messages, |m| self.handle_message(m)).await
    }
}
