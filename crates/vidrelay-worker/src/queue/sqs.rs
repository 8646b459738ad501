use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;

use super::{MessageQueue, MessageSource, QueueError, QueueMessage};

/// Build an SQS client for `region` with adaptive retries.
pub async fn sqs_client(region: &str) -> Client {
    let region_provider =
        RegionProviderChain::first_try(aws_config::Region::new(region.to_string()));

    let retry_config = RetryConfig::standard()
        .with_max_attempts(5)
        .with_retry_mode(RetryMode::Adaptive);

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .retry_config(retry_config)
        .load()
        .await;

    Client::new(&config)
}

/// One SQS queue, usable both as producer and as message source.
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    name: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        let queue_url = queue_url.into();
        let name = queue_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            client,
            queue_url,
            name,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    queue = %self.name,
                    "SQS send failed"
                );
                QueueError::Send(DisplayErrorContext(&e).to_string())
            })?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl MessageSource for SqsQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|message| {
                let receipt_handle = message.receipt_handle()?.to_string();
                let receive_count = message
                    .attributes()
                    .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);

                Some(QueueMessage {
                    message_id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle,
                    body: message.body().unwrap_or_default().to_string(),
                    receive_count,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
