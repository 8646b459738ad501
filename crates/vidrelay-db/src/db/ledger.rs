//! Progress ledger contract.
//!
//! Every operation is keyed by [`AssetIdentity`] and is a call to a durable store. The
//! ledger never retries: store errors propagate so the surrounding queue can redeliver.
//!
//! Writes other than [`ProgressLedger::initialize`] create the record first when it is
//! missing, so an escalation for an asset that was never initialized still leaves a
//! terminal record behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vidrelay_core::models::{AssetRecord, MetadataUpdate, Stage, StageField, StageRecord};
use vidrelay_core::{AssetIdentity, PipelineError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Corrupt asset record {identity}: {reason}")]
    Corrupt {
        identity: AssetIdentity,
        reason: String,
    },
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidTransition { from, to } => {
                PipelineError::InvalidTransition { from, to }
            }
            other => PipelineError::Ledger(other.to_string()),
        }
    }
}

/// Reject `(from, to)` pairs outside the compiled-in transition table.
pub fn check_transition(from: Stage, to: Stage) -> Result<(), LedgerError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition { from, to })
    }
}

#[async_trait]
pub trait ProgressLedger: Send + Sync {
    /// Create the record with all stages PENDING. Returns `false` if it already exists.
    async fn initialize(&self, identity: &AssetIdentity) -> Result<bool, LedgerError>;

    /// Write `update` as the record of `from`, and move `current_stage` to `to`.
    ///
    /// The pair must be an edge of the transition table. The stored `current_stage` is
    /// not compared against `from`.
    async fn record_stage_transition(
        &self,
        identity: &AssetIdentity,
        from: Stage,
        to: Stage,
        update: StageRecord,
    ) -> Result<bool, LedgerError>;

    /// Overwrite a single attribute of one stage record.
    async fn set_field(
        &self,
        identity: &AssetIdentity,
        stage: Stage,
        field: StageField,
    ) -> Result<bool, LedgerError>;

    /// Set the sticky terminal flag. There is no way to clear it.
    async fn mark_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError>;

    /// Replace one metadata subtree.
    async fn write_metadata(
        &self,
        identity: &AssetIdentity,
        update: MetadataUpdate,
    ) -> Result<bool, LedgerError>;

    /// Creation time of the record, or now if it does not exist.
    async fn get_created_at(&self, identity: &AssetIdentity) -> Result<DateTime<Utc>, LedgerError>;

    async fn has_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError>;

    async fn get(&self, identity: &AssetIdentity) -> Result<Option<AssetRecord>, LedgerError>;

    /// All assets of one owner, newest first.
    async fn list_assets(&self, owner_id: &str) -> Result<Vec<AssetRecord>, LedgerError>;

    /// Store the number of output objects the transcoder is going to produce.
    async fn record_expected_output_count(
        &self,
        identity: &AssetIdentity,
        count: i64,
    ) -> Result<bool, LedgerError>;

    async fn expected_output_count(
        &self,
        identity: &AssetIdentity,
    ) -> Result<Option<i64>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_transition_follows_table() {
        assert!(check_transition(Stage::Upload, Stage::Validation).is_ok());
        assert!(matches!(
            check_transition(Stage::Upload, Stage::Completion),
            Err(LedgerError::InvalidTransition {
                from: Stage::Upload,
                to: Stage::Completion
            })
        ));
    }

    #[test]
    fn invalid_transition_keeps_its_class() {
        let err: PipelineError = LedgerError::InvalidTransition {
            from: Stage::Accepted,
            to: Stage::Validation,
        }
        .into();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));

        let err: PipelineError = LedgerError::Corrupt {
            identity: AssetIdentity::new("u1", "a1"),
            reason: "bad stage".to_string(),
        }
        .into();
        assert!(matches!(err, PipelineError::Ledger(_)));
    }
}
