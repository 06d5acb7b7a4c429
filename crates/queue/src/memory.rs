//! In-memory [`QueueSource`] for tests: an `mpsc` channel stands in for
//! the broker, and acked/nacked/dead-lettered ids are recorded so a test
//! can assert on consumer behavior without a running Kafka cluster.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::Mutex;

use crate::{QueueError, QueueMessage, QueueSource};

pub struct InMemoryQueueSource {
    inbox: Mutex<tokio::sync::mpsc::UnboundedReceiver<QueueMessage>>,
    sender: tokio::sync::mpsc::UnboundedSender<QueueMessage>,
    pub acked: Arc<DashSet<String>>,
    pub nacked: Arc<DashSet<String>>,
    pub dead_lettered: Arc<DashSet<String>>,
}

impl InMemoryQueueSource {
    pub fn new() -> Self {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        Self {
            inbox: Mutex::new(receiver),
            sender,
            acked: Arc::new(DashSet::new()),
            nacked: Arc::new(DashSet::new()),
            dead_lettered: Arc::new(DashSet::new()),
        }
    }

    pub fn push(&self, author: impl Into<String>) {
        let author = author.into();
        let id = uuid::Uuid::new_v4().to_string();
        let _ = self.sender.send(QueueMessage { id, author });
    }
}

impl Default for InMemoryQueueSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueSource for InMemoryQueueSource {
    async fn poll_batch(&self, max_messages: usize, timeout: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let mut inbox = self.inbox.lock().await;
        let mut messages = Vec::with_capacity(max_messages);
        let deadline = tokio::time::Instant::now() + timeout;

        while messages.len() < max_messages {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, inbox.recv()).await {
                Ok(Some(message)) => messages.push(message),
                Ok(None) | Err(_) => break,
            }
        }

        Ok(messages)
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.acked.insert(message.id.clone());
        Ok(())
    }

    async fn nack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.nacked.insert(message.id.clone());
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, _reason: &str) -> Result<(), QueueError> {
        self.dead_lettered.insert(message.id.clone());
        Ok(())
    }
}
