//! HTTP queue service backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueueConfig;

use super::{JobMessage, JobQueue, QueueError, SendAck};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    message_body: &'a str,
    message_group_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: Option<String>,
}

/// Sends jobs to `<url>/queues/<queue>/messages`.
pub struct HttpJobQueue {
    client: Client,
    base_url: String,
    message_group_id: String,
}

impl HttpJobQueue {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            message_group_id: config.message_group_id.clone(),
        })
    }

    fn send_url(&self, queue: &str) -> String {
        format!(
            "{}/queues/{}/messages",
            self.base_url,
            urlencoding::encode(queue)
        )
    }
}

#[async_trait]
impl JobQueue for HttpJobQueue {
    async fn send(&self, queue: &str, message: &JobMessage) -> Result<SendAck, QueueError> {
        let body = message.to_body()?;
        let request = SendMessageRequest {
            message_body: &body,
            message_group_id: &self.message_group_id,
        };

        let response = self
            .client
            .post(self.send_url(queue))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueueError::Timeout
                } else {
                    QueueError::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        // The message id is informational; an unreadable body does not fail the send.
        let message_id = response
            .json::<SendMessageResponse>()
            .await
            .ok()
            .and_then(|r| r.message_id);

        debug!(queue, status, ?message_id, "Queue send acknowledged");
        Ok(SendAck { status, message_id })
    }
}
