//! Mock job queue for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::queue::{JobMessage, JobQueue, QueueError, SendAck};

/// A message the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentJob {
    pub queue: String,
    pub message: JobMessage,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Status(u16),
    Transport,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentJob>,
    attempts: usize,
    failures: HashMap<usize, Failure>,
}

/// Mock implementation of the JobQueue trait.
///
/// Send attempts are numbered from zero. Attempts scripted to fail are not
/// recorded; every other attempt is acknowledged with status 200.
#[derive(Debug, Clone, Default)]
pub struct MockJobQueue {
    state: Arc<Mutex<State>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Acknowledge attempt `n` with a non-success `status`.
    pub fn reject_nth(&self, n: usize, status: u16) {
        self.state().failures.insert(n, Failure::Status(status));
    }

    /// Fail attempt `n` with a transport error.
    pub fn fail_nth(&self, n: usize) {
        self.state().failures.insert(n, Failure::Transport);
    }

    /// Accepted messages, in send order.
    pub fn sent(&self) -> Vec<SentJob> {
        self.state().sent.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state().attempts
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn send(&self, queue: &str, message: &JobMessage) -> Result<SendAck, QueueError> {
        let mut state = self.state();
        let attempt = state.attempts;
        state.attempts += 1;

        match state.failures.get(&attempt).copied() {
            Some(Failure::Status(status)) => Ok(SendAck {
                status,
                message_id: None,
            }),
            Some(Failure::Transport) => Err(QueueError::Transport(format!(
                "mock transport failure on attempt {attempt}"
            ))),
            None => {
                state.sent.push(SentJob {
                    queue: queue.to_string(),
                    message: message.clone(),
                });
                Ok(SendAck::ok(format!("msg-{attempt}")))
            }
        }
    }
}
