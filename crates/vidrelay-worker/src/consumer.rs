//! Queue consumer runtime.
//!
//! One consumer long-polls one queue. Every batch is split by the escalation policy,
//! handled, and each message outside the failure report is acknowledged. Reported
//! messages are left alone and come back after the visibility timeout.
//!
//! Shutdown stops polling; a batch already received is still handled and acknowledged.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::batch::{BatchHandler, BatchResponse};
use crate::escalation::EscalationPolicy;
use crate::queue::{MessageSource, QueueError, QueueMessage};

/// Maximum delay in seconds between receive attempts after consecutive errors.
pub const MAX_RECEIVE_BACKOFF_SECS: u64 = 60;

/// Exponential backoff with cap for the given number of consecutive receive errors.
#[inline]
pub(crate) fn compute_receive_backoff_seconds(consecutive_errors: u32) -> u64 {
    2_u64
        .saturating_pow(consecutive_errors.saturating_sub(1))
        .min(MAX_RECEIVE_BACKOFF_SECS)
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    pub batch_size: i32,
    pub wait_time_secs: i32,
}

/// What one poll did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub received: usize,
    pub escalated: usize,
    pub acknowledged: usize,
    pub redelivered: usize,
}

pub struct QueueConsumer {
    source: Arc<dyn MessageSource>,
    handler: Arc<dyn BatchHandler>,
    escalation: Option<(EscalationPolicy, Arc<dyn BatchHandler>)>,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(
        source: Arc<dyn MessageSource>,
        handler: Arc<dyn BatchHandler>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            source,
            handler,
            escalation: None,
            config,
        }
    }

    /// Route messages past the retry budget to `handler` instead of the stage handler.
    pub fn with_escalation(mut self, policy: EscalationPolicy, handler: Arc<dyn BatchHandler>) -> Self {
        self.escalation = Some((policy, handler));
        self
    }

    pub fn queue_name(&self) -> &str {
        self.source.name()
    }

    /// Receive one batch and process it.
    pub async fn poll_once(&self) -> Result<PollSummary, QueueError> {
        let messages = self
            .source
            .receive(self.config.batch_size, self.config.wait_time_secs)
            .await?;
        Ok(self.process(messages).await)
    }

    /// Run until `shutdown` turns true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            queue = %self.queue_name(),
            handler = self.handler.name(),
            batch_size = self.config.batch_size,
            escalation = self.escalation.is_some(),
            "Queue consumer started"
        );

        let mut consecutive_errors: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.source.receive(self.config.batch_size, self.config.wait_time_secs) => result,
            };

            match received {
                Ok(messages) => {
                    consecutive_errors = 0;
                    if !messages.is_empty() {
                        self.process(messages).await;
                    }
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let backoff = compute_receive_backoff_seconds(consecutive_errors);
                    tracing::error!(
                        error = %e,
                        queue = %self.queue_name(),
                        consecutive_errors = consecutive_errors,
                        backoff_seconds = backoff,
                        "Failed to receive messages"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                    }
                }
            }
        }

        tracing::info!(queue = %self.queue_name(), "Queue consumer stopped");
    }

    async fn process(&self, messages: Vec<QueueMessage>) -> PollSummary {
        let received = messages.len();
        let (retry, escalate) = match &self.escalation {
            Some((policy, _)) => policy.partition(messages),
            None => (messages, Vec::new()),
        };

        let mut response = BatchResponse::new();
        let (primary, escalated) = tokio::join!(
            self.run_handler(self.handler.as_ref(), &retry),
            async {
                match &self.escalation {
                    Some((_, handler)) if !escalate.is_empty() => {
                        tracing::warn!(
                            queue = %self.queue_name(),
                            messages = escalate.len(),
                            "Retry budget exhausted, escalating"
                        );
                        self.run_handler(handler.as_ref(), &escalate).await
                    }
                    _ => BatchResponse::new(),
                }
            }
        );
        response.extend(primary);
        response.extend(escalated);

        let failed = response.failed_ids();
        let to_ack: Vec<&QueueMessage> = retry
            .iter()
            .chain(escalate.iter())
            .filter(|m| !failed.contains(m.message_id.as_str()))
            .collect();

        let acks = join_all(to_ack.iter().map(|m| self.source.acknowledge(m))).await;
        let mut acknowledged = 0;
        for (message, result) in to_ack.iter().zip(acks) {
            match result {
                Ok(()) => acknowledged += 1,
                Err(e) => tracing::warn!(
                    error = %e,
                    queue = %self.queue_name(),
                    message_id = %message.message_id,
                    "Failed to acknowledge message"
                ),
            }
        }

        let summary = PollSummary {
            received,
            escalated: escalate.len(),
            acknowledged,
            redelivered: failed.len(),
        };
        tracing::debug!(queue = %self.queue_name(), summary = ?summary, "Batch processed");
        summary
    }

    async fn run_handler(&self, handler: &dyn BatchHandler, messages: &[QueueMessage]) -> BatchResponse {
        if messages.is_empty() {
            return BatchResponse::new();
        }
        handler.handle_batch(messages).await
    }
}
