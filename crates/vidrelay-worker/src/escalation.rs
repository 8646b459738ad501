//! Retry budget.
//!
//! The consumer routes a message to the escalation handler once it has been delivered
//! more than `max_receive_count` times, so the budget holds even when no redrive policy
//! is configured on the queue itself.

use vidrelay_core::QueueConfig;

use crate::queue::QueueMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    max_receive_count: u32,
}

impl EscalationPolicy {
    pub fn new(max_receive_count: u32) -> Self {
        Self {
            max_receive_count: max_receive_count.max(1),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.max_receive_count)
    }

    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }

    pub fn should_escalate(&self, message: &QueueMessage) -> bool {
        message.receive_count > self.max_receive_count
    }

    /// Split a batch into `(retry, escalate)`.
    pub fn partition(&self, messages: Vec<QueueMessage>) -> (Vec<QueueMessage>, Vec<QueueMessage>) {
        messages
            .into_iter()
            .partition(|message| !self.should_escalate(message))
    }
}
