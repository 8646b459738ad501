use chrono::Utc;
use uuid::Uuid;

use crate::identity::AssetIdentity;
use crate::models::{Task, TaskType, WorkerType};

/// Build a work descriptor. `task_id` is `{TYPE}-{uuid}` so it can be traced across the
/// pool's own logs.
pub fn create_task(
    identity: &AssetIdentity,
    task_type: TaskType,
    input_key: impl Into<String>,
    output_key: impl Into<String>,
    worker_type: WorkerType,
) -> Task {
    Task {
        task_id: format!("{}-{}", task_type, Uuid::new_v4()),
        owner_id: identity.owner_id.clone(),
        asset_id: identity.asset_id.clone(),
        input_key: input_key.into(),
        output_key: output_key.into(),
        task_type,
        worker_type,
        created_at: Utc::now(),
    }
}
