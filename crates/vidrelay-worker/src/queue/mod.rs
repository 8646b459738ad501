//! Message queues between pipeline stages.
//!
//! Producers only need [`MessageQueue::send`]; the consumer runtime receives and
//! acknowledges through [`MessageSource`]. Delivery is at-least-once: a message that is
//! not acknowledged becomes visible again after the queue's visibility timeout.

mod memory;
mod sqs;

pub use memory::InMemoryQueue;
pub use sqs::{sqs_client, SqsQueue};

use async_trait::async_trait;
use thiserror::Error;

use vidrelay_core::models::Task;
use vidrelay_core::PipelineError;

/// One delivery of a queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// How many times the message has been delivered, this delivery included.
    pub receive_count: u32,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to receive messages: {0}")]
    Receive(String),

    #[error("Failed to delete message: {0}")]
    Delete(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        PipelineError::Queue(err.to_string())
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue `body`, returning the message id assigned by the queue.
    async fn send(&self, body: String) -> Result<String, QueueError>;
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Long-poll for up to `max_messages`, waiting at most `wait_time_secs`.
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a delivered message so it is never redelivered.
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

/// Serialize `task` and send it.
pub async fn enqueue_task(queue: &dyn MessageQueue, task: &Task) -> Result<String, QueueError> {
    let body = serde_json::to_string(task)?;
    let message_id = queue.send(body).await?;
    tracing::info!(
        task_id = %task.task_id,
        task_type = %task.task_type,
        owner_id = %task.owner_id,
        asset_id = %task.asset_id,
        message_id = %message_id,
        "Task enqueued"
    );
    Ok(message_id)
}
