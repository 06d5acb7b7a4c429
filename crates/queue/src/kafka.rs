//! Production [`QueueSource`] backed by `rdkafka`: manual offset commits
//! so a message is only considered delivered once the consumer has
//! either warmed its cache entry or shipped it to the dead-letter topic.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::{QueueError, QueueMessage, QueueSource};

pub struct KafkaQueueSource {
    consumer: StreamConsumer,
    producer: FutureProducer,
    dead_letter_topic: String,
}

impl KafkaQueueSource {
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        dead_letter_topic: impl Into<String>,
    ) -> Result<Self, QueueError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        Ok(Self {
            consumer,
            producer,
            dead_letter_topic: dead_letter_topic.into(),
        })
    }

    fn parse_id(id: &str) -> Option<(&str, i32, i64)> {
        let mut parts = id.rsplitn(3, ':');
        let offset: i64 = parts.next()?.parse().ok()?;
        let partition: i32 = parts.next()?.parse().ok()?;
        let topic = parts.next()?;
        Some((topic, partition, offset))
    }
}

#[async_trait]
impl QueueSource for KafkaQueueSource {
    async fn poll_batch(&self, max_messages: usize, timeout: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut messages = Vec::with_capacity(max_messages);

        while messages.len() < max_messages {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Ok(Ok(borrowed)) => {
                    let author = borrowed
                        .payload_view::<str>()
                        .transpose()
                        .ok()
                        .flatten()
                        .unwrap_or_default()
                        .to_string();
                    let id = format!("{}:{}:{}", borrowed.topic(), borrowed.partition(), borrowed.offset());
                    messages.push(QueueMessage { id, author });
                }
                Ok(Err(err)) => return Err(QueueError::Unavailable(err.to_string())),
                Err(_elapsed) => break,
            }
        }

        Ok(messages)
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let (topic, partition, offset) =
            Self::parse_id(&message.id).ok_or_else(|| QueueError::Malformed(message.id.clone()))?;
        self.consumer
            .store_offset(topic, partition, offset)
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }

    async fn nack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        // Not storing the offset leaves it uncommitted; it redelivers on
        // the next rebalance or consumer restart.
        tracing::warn!(message_id = %message.id, "message nacked, will redeliver");
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<(), QueueError> {
        let record = FutureRecord::to(&self.dead_letter_topic)
            .key(&message.id)
            .payload(&message.author)
            .headers(rdkafka::message::OwnedHeaders::new().insert(rdkafka::message::Header {
                key: "reason",
                value: Some(reason),
            }));

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| QueueError::Unavailable(err.to_string()))?;

        self.ack(message).await
    }
}
