use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::NO_ERROR;

/// Named step of the fixed pipeline.
///
/// Every variant except [`Stage::Finished`] owns a record in the asset's progress map.
/// `Finished` only ever appears as the `current_stage` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "validation")]
    Validation,
    #[serde(rename = "metadata")]
    Metadata,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "writeToStorage")]
    WriteToStorage,
    #[serde(rename = "initializeProcessor")]
    InitializeProcessor,
    #[serde(rename = "generateThumbnail")]
    GenerateThumbnail,
    #[serde(rename = "generateMP4Files")]
    GenerateMp4Files,
    #[serde(rename = "generateHLSPlaylists")]
    GenerateHlsPlaylists,
    #[serde(rename = "generateIframePlaylists")]
    GenerateIframePlaylists,
    #[serde(rename = "uploadTranscodedFootage")]
    UploadTranscodedFootage,
    #[serde(rename = "postProcessingValidation")]
    PostProcessingValidation,
    #[serde(rename = "completion")]
    Completion,
    #[serde(rename = "distribution")]
    Distribution,
    #[serde(rename = "Finished")]
    Finished,
}

impl Stage {
    /// Stages that carry a [`StageRecord`] in a freshly initialized asset.
    pub const TRACKED: [Stage; 16] = [
        Stage::Upload,
        Stage::Validation,
        Stage::Metadata,
        Stage::Accepted,
        Stage::Rejected,
        Stage::Download,
        Stage::WriteToStorage,
        Stage::InitializeProcessor,
        Stage::GenerateThumbnail,
        Stage::GenerateMp4Files,
        Stage::GenerateHlsPlaylists,
        Stage::GenerateIframePlaylists,
        Stage::UploadTranscodedFootage,
        Stage::PostProcessingValidation,
        Stage::Completion,
        Stage::Distribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Validation => "validation",
            Stage::Metadata => "metadata",
            Stage::Accepted => "accepted",
            Stage::Rejected => "rejected",
            Stage::Download => "download",
            Stage::WriteToStorage => "writeToStorage",
            Stage::InitializeProcessor => "initializeProcessor",
            Stage::GenerateThumbnail => "generateThumbnail",
            Stage::GenerateMp4Files => "generateMP4Files",
            Stage::GenerateHlsPlaylists => "generateHLSPlaylists",
            Stage::GenerateIframePlaylists => "generateIframePlaylists",
            Stage::UploadTranscodedFootage => "uploadTranscodedFootage",
            Stage::PostProcessingValidation => "postProcessingValidation",
            Stage::Completion => "completion",
            Stage::Distribution => "distribution",
            Stage::Finished => "Finished",
        }
    }

    /// Legal successors of this stage in the compiled-in pipeline.
    pub fn allowed_next(&self) -> &'static [Stage] {
        match self {
            Stage::Upload => &[Stage::Validation],
            Stage::Validation => &[Stage::Metadata, Stage::Rejected],
            Stage::Metadata => &[Stage::Accepted],
            Stage::Accepted => &[Stage::Download],
            Stage::Download => &[Stage::WriteToStorage],
            Stage::WriteToStorage => &[Stage::InitializeProcessor],
            Stage::InitializeProcessor => &[Stage::GenerateThumbnail],
            Stage::GenerateThumbnail => &[Stage::GenerateMp4Files],
            Stage::GenerateMp4Files => &[Stage::GenerateHlsPlaylists],
            Stage::GenerateHlsPlaylists => &[Stage::GenerateIframePlaylists],
            Stage::GenerateIframePlaylists => &[Stage::UploadTranscodedFootage],
            Stage::UploadTranscodedFootage => &[Stage::PostProcessingValidation],
            Stage::PostProcessingValidation => &[Stage::Completion],
            Stage::Completion => &[Stage::Finished],
            Stage::Rejected | Stage::Distribution | Stage::Finished => &[],
        }
    }

    pub fn can_transition_to(&self, next: Stage) -> bool {
        self.allowed_next().contains(&next)
    }

    /// True while the asset has not yet been handed to the worker pool.
    pub fn awaits_dispatch(&self) -> bool {
        matches!(
            self,
            Stage::Upload | Stage::Validation | Stage::Metadata | Stage::Accepted
        )
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::TRACKED
            .iter()
            .chain(std::iter::once(&Stage::Finished))
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Invalid stage: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Completed,
    Failed,
    /// Not actionable right now (backpressure or a recoverable precondition).
    Hold,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "PENDING",
            StageStatus::Completed => "COMPLETED",
            StageStatus::Failed => "FAILED",
            StageStatus::Hold => "HOLD",
        }
    }
}

impl Display for StageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Progress of one stage. `error` holds [`NO_ERROR`] when there is nothing to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub status: StageStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: String,
}

impl StageRecord {
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            start_time: None,
            end_time: None,
            error: NO_ERROR.to_string(),
        }
    }

    /// Record ending now.
    pub fn new(status: StageStatus, start_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status,
            start_time: Some(start_time),
            end_time: Some(Utc::now()),
            error: error.into(),
        }
    }

    pub fn completed(start_time: DateTime<Utc>) -> Self {
        Self::new(StageStatus::Completed, start_time, NO_ERROR)
    }

    pub fn failed(start_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self::new(StageStatus::Failed, start_time, error)
    }

    pub fn hold(start_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self::new(StageStatus::Hold, start_time, error)
    }

    pub fn has_error(&self) -> bool {
        self.error != NO_ERROR
    }
}

impl Default for StageRecord {
    fn default() -> Self {
        Self::pending()
    }
}

/// Single-field update applied by `ProgressLedger::set_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageField {
    Status(StageStatus),
    StartTime(DateTime<Utc>),
    EndTime(DateTime<Utc>),
    Error(String),
}

impl StageField {
    /// Attribute name inside the stage record.
    pub fn name(&self) -> &'static str {
        match self {
            StageField::Status(_) => "status",
            StageField::StartTime(_) => "startTime",
            StageField::EndTime(_) => "endTime",
            StageField::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StageField::Status(status) => serde_json::Value::String(status.as_str().to_string()),
            StageField::StartTime(t) | StageField::EndTime(t) => {
                serde_json::to_value(t).unwrap_or(serde_json::Value::Null)
            }
            StageField::Error(message) => serde_json::Value::String(message.clone()),
        }
    }

    pub fn apply(&self, record: &mut StageRecord) {
        match self {
            StageField::Status(status) => record.status = *status,
            StageField::StartTime(t) => record.start_time = Some(*t),
            StageField::EndTime(t) => record.end_time = Some(*t),
            StageField::Error(message) => record.error = message.clone(),
        }
    }
}
