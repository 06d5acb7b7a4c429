//! Drains the queue in small batches, warming the cache for each
//! not-yet-seen author: `searchByAuthor`, then `searchByTitle` for every
//! work it returns. A `processed:author:*` marker with a long TTL keeps a
//! redelivered or duplicate message from re-running the whole fan-out.

use std::sync::Arc;
use std::time::Duration;

use book_gateway_cache::{keys, UnifiedCache};
use book_gateway_core::error::GatewayError;
use book_gateway_engine::{EnrichQuery, EnrichmentEngine};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use crate::{QueueMessage, QueueSource};

const BATCH_SIZE: usize = 10;
const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONCURRENT: usize = 5;
const MAX_RETRIES: u32 = 3;
const PROCESSED_MARKER_TTL: Duration = Duration::from_secs(90 * 24 * 3600);

pub struct CacheWarmingConsumer {
    source: Arc<dyn QueueSource>,
    engine: Arc<EnrichmentEngine>,
    cache: Arc<UnifiedCache>,
    retries: DashMap<String, u32>,
}

impl CacheWarmingConsumer {
    pub fn new(source: Arc<dyn QueueSource>, engine: Arc<EnrichmentEngine>, cache: Arc<UnifiedCache>) -> Self {
        Self {
            source,
            engine,
            cache,
            retries: DashMap::new(),
        }
    }

    /// Pulls one batch and processes it to completion. Intended to be
    /// called in a loop by a long-running task.
    pub async fn run_once(&self) -> Result<usize, GatewayError> {
        let messages = self
            .source
            .poll_batch(BATCH_SIZE, POLL_TIMEOUT)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let count = messages.len();

        stream::iter(messages)
            .map(|message| self.process(message))
            .buffer_unordered(MAX_CONCURRENT)
            .collect::<Vec<()>>()
            .await;

        Ok(count)
    }

    async fn already_processed(&self, author: &str) -> bool {
        matches!(self.cache.get(&keys::author_processed_marker(author)).await, Ok(Some(_)))
    }

    async fn mark_processed(&self, author: &str) {
        if let Err(err) = self
            .cache
            .put(
                &keys::author_processed_marker(author),
                json!({ "processed": true }),
                PROCESSED_MARKER_TTL,
                "cache-warmer",
                1.0,
            )
            .await
        {
            warn!(author, error = %err, "failed to write processed marker");
        }
    }

    async fn warm(&self, author: &str) -> Result<(), GatewayError> {
        let result = self.engine.enrich_many(&EnrichQuery::by_author(author), 20).await?;
        for work in result.works {
            if let Err(err) = self.engine.enrich_one(&EnrichQuery::by_title(work.title.clone())).await {
                // Per-title failures don't fail the author-level message;
                // the title simply stays cold until the next sweep.
                debug!(title = work.title, error = %err, "title warm-up failed");
            }
        }
        Ok(())
    }

    async fn process(&self, message: QueueMessage) {
        if self.already_processed(&message.author).await {
            let _ = self.source.ack(&message).await;
            return;
        }

        match self.warm(&message.author).await {
            Ok(()) => {
                self.mark_processed(&message.author).await;
                self.retries.remove(&message.id);
                let _ = self.source.ack(&message).await;
            }
            Err(err) if is_retryable(&err) => {
                let attempts = {
                    let mut entry = self.retries.entry(message.id.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                if attempts >= MAX_RETRIES {
                    self.retries.remove(&message.id);
                    let _ = self.source.dead_letter(&message, &err.to_string()).await;
                } else {
                    warn!(author = message.author, attempts, error = %err, "retrying cache warm");
                    let _ = self.source.nack(&message).await;
                }
            }
            Err(err) => {
                self.retries.remove(&message.id);
                let _ = self.source.dead_letter(&message, &err.to_string()).await;
            }
        }
    }
}

fn is_retryable(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::RateLimited { .. } | GatewayError::ProviderTimeout { .. } | GatewayError::ProviderTransient { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueueSource;
    use book_gateway_cache::InMemoryDurableStore;
    use book_gateway_core::config::TtlConfig;
    use book_gateway_core::models::{Edition, EditionFormat, Work};
    use book_gateway_providers::{NormalizedResponse, ProviderClient, ProviderError, ProviderMeta};

    struct StubProvider {
        works: Vec<Work>,
    }

    #[async_trait::async_trait]
    impl ProviderClient for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search_by_title(
            &self,
            _query: &str,
            _max: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            Ok((
                NormalizedResponse { works: self.works.clone() },
                ProviderMeta {
                    provider: "stub".to_string(),
                    raw_result_count: self.works.len(),
                },
            ))
        }

        async fn search_by_isbn(
            &self,
            _isbn: &str,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.search_by_title("", 1).await
        }

        async fn search_by_author(
            &self,
            _name: &str,
            _limit: usize,
            _offset: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.search_by_title("", 1).await
        }
    }

    fn work(title: &str) -> Work {
        Work {
            title: title.to_string(),
            subject_tags: vec![],
            description: None,
            first_publication_year: None,
            authors: vec![],
            editions: vec![Edition {
                isbn: None,
                isbn_list: vec![],
                publisher: None,
                publication_year: None,
                format: EditionFormat::Unknown,
                cover_url: None,
                primary_provider: "stub".to_string(),
            }],
            synthetic: true,
            primary_provider: "stub".to_string(),
            contributors: Default::default(),
            google_books_volume_ids: vec![],
            open_library_work_ids: vec![],
            isbndb_ids: vec![],
            quality_score: 0.5,
        }
    }

    fn consumer(source: Arc<InMemoryQueueSource>) -> CacheWarmingConsumer {
        let cache = Arc::new(UnifiedCache::new(
            Arc::new(InMemoryDurableStore::new()),
            1000,
            Duration::from_secs(60),
        ));
        let provider = Arc::new(StubProvider {
            works: vec![work("Dune")],
        });
        let engine = Arc::new(EnrichmentEngine::new(
            provider.clone(),
            provider.clone(),
            provider,
            cache.clone(),
            TtlConfig::default(),
        ));
        CacheWarmingConsumer::new(source, engine, cache)
    }

    #[tokio::test]
    async fn warms_cache_and_acks_on_success() {
        let source = Arc::new(InMemoryQueueSource::new());
        source.push("Frank Herbert");
        let consumer = consumer(source.clone());

        let processed = consumer.run_once().await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(source.acked.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_author_is_skipped_and_acked() {
        let source = Arc::new(InMemoryQueueSource::new());
        source.push("Frank Herbert");
        let consumer = consumer(source.clone());
        consumer.run_once().await.unwrap();

        source.push("Frank Herbert");
        consumer.run_once().await.unwrap();
        assert_eq!(source.acked.len(), 2);
    }
}
