use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::identity::AssetIdentity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Validation,
    Transcode,
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskType::Validation => write!(f, "VALIDATION"),
            TaskType::Transcode => write!(f, "TRANSCODE"),
        }
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDATION" => Ok(TaskType::Validation),
            "TRANSCODE" => Ok(TaskType::Transcode),
            _ => Err(anyhow::anyhow!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerType {
    Validator,
    Processor,
}

impl Display for WorkerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WorkerType::Validator => write!(f, "VALIDATOR"),
            WorkerType::Processor => write!(f, "PROCESSOR"),
        }
    }
}

impl FromStr for WorkerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDATOR" => Ok(WorkerType::Validator),
            "PROCESSOR" => Ok(WorkerType::Processor),
            _ => Err(anyhow::anyhow!("Invalid worker type: {}", s)),
        }
    }
}

/// Immutable work descriptor carried by a queue message.
///
/// The wire names (`userId`, `type`, `worker`) are shared with the external worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub asset_id: String,
    pub input_key: String,
    pub output_key: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(rename = "worker")]
    pub worker_type: WorkerType,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn identity(&self) -> AssetIdentity {
        AssetIdentity::new(self.owner_id.clone(), self.asset_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_uses_wire_field_names() {
        let task = Task {
            task_id: "TRANSCODE-1".to_string(),
            owner_id: "u1".to_string(),
            asset_id: "a1".to_string(),
            input_key: "u1/a1/video.mp4".to_string(),
            output_key: "u1/a1".to_string(),
            task_type: TaskType::Transcode,
            worker_type: WorkerType::Processor,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["assetId"], "a1");
        assert_eq!(value["inputKey"], "u1/a1/video.mp4");
        assert_eq!(value["type"], "TRANSCODE");
        assert_eq!(value["worker"], "PROCESSOR");
        assert!(value.get("createdAt").is_some());

        let parsed: Task = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn task_type_parses_wire_names() {
        assert_eq!("VALIDATION".parse::<TaskType>().unwrap(), TaskType::Validation);
        assert_eq!("PROCESSOR".parse::<WorkerType>().unwrap(), WorkerType::Processor);
        assert!("transcode".parse::<TaskType>().is_err());
    }
}
