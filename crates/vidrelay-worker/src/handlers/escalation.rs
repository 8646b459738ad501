use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use vidrelay_core::constants::{
    COMPLETION_ESCALATION_MESSAGE, DISPATCH_ESCALATION_MESSAGE, INTAKE_ESCALATION_MESSAGE,
    VALIDATION_ESCALATION_MESSAGE,
};
use vidrelay_core::models::{Stage, StageField, StageStatus};
use vidrelay_core::{AssetIdentity, PipelineError};

use super::{parse_notification, parse_task};
use crate::batch::{merge_results, process_each, BatchHandler, BatchResponse};
use crate::context::PipelineContext;
use crate::queue::QueueMessage;

/// The stage handler an escalation handler backs up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTarget {
    Intake,
    Validation,
    Dispatch,
    Completion,
}

impl EscalationTarget {
    /// Stage forced to FAILED.
    pub fn stage(&self) -> Stage {
        match self {
            EscalationTarget::Intake => Stage::Upload,
            EscalationTarget::Validation => Stage::Validation,
            EscalationTarget::Dispatch => Stage::Accepted,
            EscalationTarget::Completion => Stage::Completion,
        }
    }

    /// User-facing terminal error.
    pub fn message(&self) -> &'static str {
        match self {
            EscalationTarget::Intake => INTAKE_ESCALATION_MESSAGE,
            EscalationTarget::Validation => VALIDATION_ESCALATION_MESSAGE,
            EscalationTarget::Dispatch => DISPATCH_ESCALATION_MESSAGE,
            EscalationTarget::Completion => COMPLETION_ESCALATION_MESSAGE,
        }
    }

    fn handler_name(&self) -> &'static str {
        match self {
            EscalationTarget::Intake => "intake-escalation",
            EscalationTarget::Validation => "validation-escalation",
            EscalationTarget::Dispatch => "dispatch-escalation",
            EscalationTarget::Completion => "completion-escalation",
        }
    }

    /// Assets referenced by a message of the target's queue.
    fn identities(&self, message: &QueueMessage) -> Vec<Result<AssetIdentity, PipelineError>> {
        match self {
            EscalationTarget::Intake | EscalationTarget::Completion => {
                match parse_notification(message) {
                    Ok(notification) => notification
                        .records
                        .iter()
                        .map(|r| AssetIdentity::from_key(&r.decoded_key()))
                        .collect(),
                    Err(e) => vec![Err(e)],
                }
            }
            EscalationTarget::Validation | EscalationTarget::Dispatch => {
                vec![parse_task(message).map(|task| task.identity())]
            }
        }
    }
}

/// Forces the assets of an exhausted message into a terminal failed state.
///
/// Never enqueues work. Unparseable messages are dropped; ledger failures are reported
/// for redelivery.
pub struct EscalationHandler {
    ctx: Arc<PipelineContext>,
    target: EscalationTarget,
}

impl EscalationHandler {
    pub fn new(ctx: Arc<PipelineContext>, target: EscalationTarget) -> Self {
        Self { ctx, target }
    }

    pub fn target(&self) -> EscalationTarget {
        self.target
    }

    async fn handle_message(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        let results = join_all(self.target.identities(message).into_iter().map(|identity| async move {
            self.terminate(&identity?).await
        }))
        .await;
        merge_results(results)
    }

    async fn terminate(&self, identity: &AssetIdentity) -> Result<(), PipelineError> {
        let ledger = self.ctx.ledger.as_ref();
        let stage = self.target.stage();

        ledger
            .set_field(identity, stage, StageField::Status(StageStatus::Failed))
            .await?;
        ledger
            .set_field(identity, stage, StageField::Error(self.target.message().to_string()))
            .await?;
        ledger.mark_critical_failure(identity).await?;

        tracing::warn!(
            handler = self.target.handler_name(),
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            stage = %stage,
            "Asset escalated to terminal failure"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for EscalationHandler {
    fn name(&self) -> &'static str {
        self.target.handler_name()
    }

    #[tracing::instrument(skip(self, messages), fields(handler = self.target.handler_name(), batch_size = messages.len()))]
    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        process_each(self.name(), messages, |m| self.handle_message(m)).await
    }
}
