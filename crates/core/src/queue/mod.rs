//! Job queue abstraction.
//!
//! Jobs are delivered at least once: a run that fails part-way leaves its
//! already-sent jobs on the queue and they are sent again by the next run.

mod http;

pub use http::HttpJobQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unit placed on a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Where the worker reads its level1 input
    #[serde(rename = "source_url")]
    pub source_address: String,
    /// Encrypted submit address for the result
    #[serde(rename = "target_url")]
    pub target_address: String,
}

impl JobMessage {
    /// Canonical JSON body of the message.
    pub fn to_body(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Encode(e.to_string()))
    }
}

/// Acknowledgement from the queue service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    /// Transport status code
    pub status: u16,
    pub message_id: Option<String>,
}

impl SendAck {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            status: 200,
            message_id: Some(message_id.into()),
        }
    }

    /// Only a 200 acknowledgement counts as delivered.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Errors that prevent a send from completing at all.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Queue request timed out")]
    Timeout,

    #[error("Queue transport error: {0}")]
    Transport(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Trait for queue backends.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Send one job to the named queue.
    async fn send(&self, queue: &str, message: &JobMessage) -> Result<SendAck, QueueError>;
}
