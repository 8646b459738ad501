use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identity::AssetIdentity;
use crate::models::metadata::AssetMetadata;
use crate::models::stage::{Stage, StageRecord};

/// Aggregate root tracked by the progress ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    #[serde(flatten)]
    pub identity: AssetIdentity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Most recently entered stage. Advisory only.
    pub current_stage: Stage,
    pub has_critical_failure: bool,
    pub progress: BTreeMap<Stage, StageRecord>,
    pub metadata: AssetMetadata,
    /// Output object count reported by the transcoding worker.
    pub expected_output_count: Option<i64>,
}

impl AssetRecord {
    /// Fresh record with every tracked stage PENDING.
    pub fn new(identity: AssetIdentity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            created_at: now,
            updated_at: now,
            current_stage: Stage::Upload,
            has_critical_failure: false,
            progress: initial_progress(),
            metadata: AssetMetadata::default(),
            expected_output_count: None,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.progress.get(&stage)
    }

    pub fn is_finished(&self) -> bool {
        self.current_stage == Stage::Finished
    }
}

pub fn initial_progress() -> BTreeMap<Stage, StageRecord> {
    Stage::TRACKED
        .iter()
        .map(|stage| (*stage, StageRecord::pending()))
        .collect()
}
