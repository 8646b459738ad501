//! Stage handlers and their escalation counterparts.

mod completion;
mod dispatch;
mod escalation;
mod intake;
mod validation;

pub use completion::CompletionHandler;
pub use dispatch::DispatchHandler;
pub use escalation::{EscalationHandler, EscalationTarget};
pub use intake::IntakeHandler;
pub use validation::ValidationHandler;

use chrono::{DateTime, Utc};

use vidrelay_core::constants::NO_ERROR;
use vidrelay_core::models::{ObjectNotification, Stage, StageField, StageStatus, Task};
use vidrelay_core::{AssetIdentity, PipelineError};
use vidrelay_db::ProgressLedger;

use crate::queue::QueueMessage;

pub(crate) fn parse_notification(message: &QueueMessage) -> Result<ObjectNotification, PipelineError> {
    serde_json::from_str(&message.body)
        .map_err(|e| PipelineError::MalformedMessage(format!("object notification: {}", e)))
}

pub(crate) fn parse_task(message: &QueueMessage) -> Result<Task, PipelineError> {
    serde_json::from_str(&message.body)
        .map_err(|e| PipelineError::MalformedMessage(format!("task: {}", e)))
}

/// True when the asset is already in the terminal critical state and must not progress.
pub(crate) async fn is_terminal(
    ledger: &dyn ProgressLedger,
    identity: &AssetIdentity,
    handler: &str,
) -> Result<bool, PipelineError> {
    let critical = ledger.has_critical_failure(identity).await?;
    if critical {
        tracing::info!(
            handler = handler,
            owner_id = %identity.owner_id,
            asset_id = %identity.asset_id,
            "Asset has a critical failure, skipping"
        );
    }
    Ok(critical)
}

/// Write `stage` as COMPLETED, started at `start_time` and ending now, without moving the
/// stage pointer.
pub(crate) async fn complete_stage(
    ledger: &dyn ProgressLedger,
    identity: &AssetIdentity,
    stage: Stage,
    start_time: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let fields = [
        StageField::StartTime(start_time),
        StageField::EndTime(Utc::now()),
        StageField::Error(NO_ERROR.to_string()),
        StageField::Status(StageStatus::Completed),
    ];
    for field in fields {
        ledger.set_field(identity, stage, field).await?;
    }
    Ok(())
}
