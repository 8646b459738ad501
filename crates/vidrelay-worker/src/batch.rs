//! Batch partial-failure protocol shared by every queue handler.
//!
//! Each message of a batch is processed concurrently in its own error boundary. The
//! handler answers with the ids of the messages that must be redelivered; every other
//! message is acknowledged. Client faults are logged and dropped so a malformed message
//! is never redelivered forever.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;

use vidrelay_core::{ErrorMetadata, LogLevel, PipelineError};

use crate::queue::QueueMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Messages of a batch that must be redelivered. Empty means the whole batch succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message_id: impl Into<String>) {
        self.batch_item_failures.push(BatchItemFailure {
            item_identifier: message_id.into(),
        });
    }

    pub fn extend(&mut self, other: BatchResponse) {
        self.batch_item_failures.extend(other.batch_item_failures);
    }

    pub fn is_empty(&self) -> bool {
        self.batch_item_failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batch_item_failures.len()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.batch_item_failures
            .iter()
            .any(|f| f.item_identifier == message_id)
    }

    pub fn failed_ids(&self) -> HashSet<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

/// A consumer of queue batches: a stage handler or its escalation counterpart.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse;
}

/// Whether a failed item goes back on the queue.
pub fn should_redeliver(err: &PipelineError) -> bool {
    err.is_recoverable()
}

/// Log an item failure at the level its classification asks for.
pub fn log_item_error(handler: &str, message_id: &str, err: &PipelineError) {
    let redeliver = should_redeliver(err);
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            handler = handler,
            message_id = %message_id,
            error = %err,
            error_code = err.error_code(),
            redeliver = redeliver,
            "Item failed"
        ),
        LogLevel::Warn => tracing::warn!(
            handler = handler,
            message_id = %message_id,
            error = %err,
            error_code = err.error_code(),
            redeliver = redeliver,
            "Item failed"
        ),
        LogLevel::Error => tracing::error!(
            handler = handler,
            message_id = %message_id,
            error = %err.detailed_message(),
            error_code = err.error_code(),
            redeliver = redeliver,
            "Item failed"
        ),
    }
}

/// Run `f` for every message concurrently and collect the redelivery report.
pub async fn process_each<'a, F, Fut>(
    handler: &str,
    messages: &'a [QueueMessage],
    f: F,
) -> BatchResponse
where
    F: Fn(&'a QueueMessage) -> Fut,
    Fut: Future<Output = Result<(), PipelineError>>,
{
    let results = join_all(messages.iter().map(|message| {
        let fut = f(message);
        async move { (message, fut.await) }
    }))
    .await;

    let mut response = BatchResponse::new();
    for (message, result) in results {
        if let Err(err) = result {
            log_item_error(handler, &message.message_id, &err);
            if should_redeliver(&err) {
                response.push(message.message_id.clone());
            }
        }
    }
    response
}

/// Fold the outcomes of the sub-events carried by one message.
///
/// A recoverable error wins so the message is redelivered. Otherwise the first client
/// fault is returned so it gets logged and dropped.
pub fn merge_results(results: Vec<Result<(), PipelineError>>) -> Result<(), PipelineError> {
    let mut first_client_fault = None;
    for result in results {
        match result {
            Ok(()) => {}
            Err(err) if should_redeliver(&err) => return Err(err),
            Err(err) => {
                if first_client_fault.is_none() {
                    first_client_fault = Some(err);
                } else {
                    tracing::debug!(error = %err, "Additional sub-event dropped");
                }
            }
        }
    }
    match first_client_fault {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> QueueMessage {
        QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("receipt-{}", id),
            body: String::new(),
            receive_count: 1,
        }
    }

    #[tokio::test]
    async fn only_recoverable_failures_are_reported() {
        let messages = vec![message("ok"), message("transient"), message("malformed")];

        let response = process_each("test", &messages, |m| async move {
            match m.message_id.as_str() {
                "transient" => Err(PipelineError::Ledger("throttled".to_string())),
                "malformed" => Err(PipelineError::MalformedKey("x".to_string())),
                _ => Ok(()),
            }
        })
        .await;

        assert_eq!(response.len(), 1);
        assert!(response.contains("transient"));
        assert!(!response.contains("malformed"));
    }

    #[test]
    fn merge_prefers_recoverable_error() {
        let merged = merge_results(vec![
            Err(PipelineError::MalformedKey("a".to_string())),
            Ok(()),
            Err(PipelineError::Storage("503".to_string())),
        ]);
        assert!(matches!(merged, Err(PipelineError::Storage(_))));

        let merged = merge_results(vec![Ok(()), Err(PipelineError::MalformedKey("a".to_string()))]);
        assert!(matches!(merged, Err(PipelineError::MalformedKey(_))));

        assert!(merge_results(vec![Ok(()), Ok(())]).is_ok());
    }

    #[test]
    fn response_serializes_in_queue_wire_format() {
        let mut response = BatchResponse::new();
        response.push("m-1");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"batchItemFailures": [{"itemIdentifier": "m-1"}]})
        );
    }
}
