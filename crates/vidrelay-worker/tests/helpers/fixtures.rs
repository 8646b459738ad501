//! Message and object builders.

use vidrelay_core::models::{ObjectNotification, Task, TaskType, WorkerType};
use vidrelay_core::{create_task, AssetIdentity};

use vidrelay_worker::QueueMessage;

pub const TRANSPORT_BUCKET: &str = "vidrelay-transport";
pub const CONTENT_BUCKET: &str = "vidrelay-content";

/// A first delivery of `body`.
pub fn message(id: &str, body: impl Into<String>) -> QueueMessage {
    QueueMessage {
        message_id: id.to_string(),
        receipt_handle: format!("receipt-{}", id),
        body: body.into(),
        receive_count: 1,
    }
}

pub fn upload_notification(id: &str, key: &str) -> QueueMessage {
    let body = serde_json::to_string(&ObjectNotification::for_key(TRANSPORT_BUCKET, key))
        .expect("notification serializes");
    message(id, body)
}

pub fn completion_notification(id: &str, key: &str) -> QueueMessage {
    let body = serde_json::to_string(&ObjectNotification::for_key(CONTENT_BUCKET, key))
        .expect("notification serializes");
    message(id, body)
}

/// The TRANSCODE task validation enqueues for `identity`.
pub fn transcode_task(identity: &AssetIdentity) -> Task {
    create_task(
        identity,
        TaskType::Transcode,
        format!("{}/video.mp4", identity.prefix()),
        identity.prefix(),
        WorkerType::Processor,
    )
}

pub fn task_message(id: &str, task: &Task) -> QueueMessage {
    message(id, serde_json::to_string(task).expect("task serializes"))
}

/// Bytes standing in for an uploaded video.
pub fn sample_video() -> bytes::Bytes {
    bytes::Bytes::from_static(b"\x00\x00\x00\x18ftypmp42 not really a video")
}
