//! # Book Gateway Queue
//!
//! A cache-warming consumer: pulls author names off a queue and runs them
//! through the enrichment engine so a later interactive `searchByAuthor`
//! request hits a warm cache. [`QueueSource`] is the trait seam (a real
//! Kafka-backed source, and an in-memory one for tests), mirroring the
//! `Arc<dyn PlatformNormalizer>` trait-object fan-out the ingestion
//! pipeline this crate is modeled on already used for its platform
//! adapters.

pub mod consumer;
pub mod kafka;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use consumer::CacheWarmingConsumer;
pub use kafka::KafkaQueueSource;
pub use memory::InMemoryQueueSource;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    #[error("message malformed: {0}")]
    Malformed(String),
}

/// One unit of work pulled off the queue: an author name to warm, plus
/// whatever the source needs to ack/nack/dead-letter it later.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub author: String,
}

/// A pluggable queue backend. Implementations own delivery semantics
/// (commit offsets, redeliver, etc.); the consumer only ever sees
/// ack/nack/dead_letter.
#[async_trait]
pub trait QueueSource: Send + Sync {
    async fn poll_batch(&self, max_messages: usize, timeout: std::time::Duration) -> Result<Vec<QueueMessage>, QueueError>;
    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError>;
    async fn nack(&self, message: &QueueMessage) -> Result<(), QueueError>;
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<(), QueueError>;
}
