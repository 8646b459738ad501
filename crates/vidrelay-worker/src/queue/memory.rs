use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::{MessageQueue, MessageSource, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
}

/// Queue held in process memory.
///
/// Received messages stay in flight until acknowledged;
/// [`InMemoryQueue::expire_visibility`] plays the part of the visibility timeout.
pub struct InMemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue a message that has already been delivered `receive_count` times.
    pub async fn push_with_receive_count(&self, body: impl Into<String>, receive_count: u32) -> String {
        let message_id = Uuid::new_v4().to_string();
        self.state.lock().await.visible.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: body.into(),
            receive_count,
        });
        self.notify.notify_one();
        message_id
    }

    /// Make every unacknowledged in-flight message visible again.
    pub async fn expire_visibility(&self) -> usize {
        let mut state = self.state.lock().await;
        let expired: Vec<StoredMessage> = state.in_flight.drain().map(|(_, m)| m).collect();
        let count = expired.len();
        state.visible.extend(expired);
        drop(state);
        if count > 0 {
            self.notify.notify_one();
        }
        count
    }

    /// Bodies of the messages currently visible, oldest first.
    pub async fn visible_bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .visible
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }

    pub async fn visible_len(&self) -> usize {
        self.state.lock().await.visible.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    async fn take_visible(&self, max_messages: usize) -> Vec<QueueMessage> {
        let mut state = self.state.lock().await;
        let mut delivered = Vec::new();

        while delivered.len() < max_messages {
            let Some(mut message) = state.visible.pop_front() else {
                break;
            };
            message.receive_count += 1;
            let receipt_handle = Uuid::new_v4().to_string();
            delivered.push(QueueMessage {
                message_id: message.message_id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            state.in_flight.insert(receipt_handle, message);
        }

        delivered
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        Ok(self.push_with_receive_count(body, 0).await)
    }
}

#[async_trait]
impl MessageSource for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let max_messages = max_messages.max(1) as usize;
        let delivered = self.take_visible(max_messages).await;
        if !delivered.is_empty() || wait_time_secs <= 0 {
            return Ok(delivered);
        }

        let wait = Duration::from_secs(wait_time_secs as u64);
        let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        Ok(self.take_visible(max_messages).await)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let removed = self
            .state
            .lock()
            .await
            .in_flight
            .remove(&message.receipt_handle);

        match removed {
            Some(_) => Ok(()),
            None => Err(QueueError::Delete(format!(
                "unknown receipt handle for message {}",
                message.message_id
            ))),
        }
    }
}
