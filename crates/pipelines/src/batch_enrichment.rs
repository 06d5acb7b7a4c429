//! Batch enrichment: look up a list of books against the provider chain
//! concurrently, reporting progress as each one resolves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use book_gateway_core::error::GatewayError;
use book_gateway_core::models::{AuthToken, Pipeline};
use book_gateway_coordinator::CoordinatorRegistry;
use book_gateway_engine::batch::{run_batch, BatchItem};
use book_gateway_engine::{EnrichQuery, EnrichmentEngine};
use book_gateway_ratelimit::RateLimiter;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{sanitize_author, sanitize_isbn, sanitize_title};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

impl From<&BookQuery> for EnrichQuery {
    fn from(q: &BookQuery) -> Self {
        EnrichQuery {
            isbn: q.isbn.clone(),
            title: q.title.clone(),
            author: q.author.clone(),
        }
    }
}

fn display_label(q: &BookQuery) -> String {
    q.title
        .clone()
        .or_else(|| q.isbn.clone())
        .or_else(|| q.author.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchEnrichmentRequest {
    pub books: Vec<BookQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEnrichmentOutcome {
    pub job_id: Uuid,
    pub token: AuthToken,
    pub total_count: usize,
}

pub struct BatchEnrichmentPipeline {
    engine: Arc<EnrichmentEngine>,
    registry: Arc<CoordinatorRegistry>,
    limiter: Arc<RateLimiter>,
    max_batch_books: usize,
    concurrency: usize,
}

impl BatchEnrichmentPipeline {
    pub fn new(
        engine: Arc<EnrichmentEngine>,
        registry: Arc<CoordinatorRegistry>,
        limiter: Arc<RateLimiter>,
        max_batch_books: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            engine,
            registry,
            limiter,
            max_batch_books,
            concurrency,
        }
    }

    pub async fn start(
        &self,
        client_id: &str,
        request: BatchEnrichmentRequest,
    ) -> Result<BatchEnrichmentOutcome, GatewayError> {
        let decision = self.limiter.check_and_increment(client_id);
        if !decision.allowed {
            return Err(GatewayError::RateLimited {
                retry_after_secs: decision.retry_after.map(|d| d.as_secs()).unwrap_or(60),
            });
        }

        if request.books.is_empty() {
            return Err(GatewayError::Validation("books must not be empty".to_string()));
        }
        if request.books.len() > self.max_batch_books {
            return Err(GatewayError::Validation(format!(
                "books exceeds max batch size of {}",
                self.max_batch_books
            )));
        }

        let books: Vec<BookQuery> = request
            .books
            .iter()
            .map(|b| BookQuery {
                title: sanitize_title(b.title.as_deref()),
                author: sanitize_author(b.author.as_deref()),
                isbn: sanitize_isbn(b.isbn.as_deref()),
            })
            .collect();
        if books.iter().any(|b| b.title.is_none() && b.author.is_none() && b.isbn.is_none()) {
            return Err(GatewayError::Validation(
                "every book needs at least one of title, author, isbn".to_string(),
            ));
        }

        let total = books.len();
        let handle = self.registry.init(Pipeline::BatchEnrichment, total);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await?;

        let engine = self.engine.clone();
        let concurrency = self.concurrency;
        let job_handle = handle.clone();
        tokio::spawn(async move {
            run(engine, job_handle, books, concurrency).await;
        });

        Ok(BatchEnrichmentOutcome {
            job_id: handle.job_id(),
            token,
            total_count: total,
        })
    }
}

async fn run(
    engine: Arc<EnrichmentEngine>,
    handle: book_gateway_coordinator::CoordinatorHandle,
    books: Vec<BookQuery>,
    concurrency: usize,
) {
    if !handle.wait_for_ready(Duration::from_secs(30)).await {
        let _ = handle.fail("client never attached before timeout").await;
        return;
    }

    let started = Instant::now();
    let total = books.len();
    let items: Vec<BatchItem<BookQuery>> = books
        .into_iter()
        .enumerate()
        .map(|(i, book)| BatchItem::new(format!("Enriching ({}/{}): {}", i + 1, total, display_label(&book)), book))
        .collect();

    let progress_handle = handle.clone();
    let cancel_handle = handle.clone();
    let results = run_batch(
        items,
        concurrency,
        move |book: BookQuery| {
            let engine = engine.clone();
            let cancel_handle = cancel_handle.clone();
            async move {
                if cancel_handle.is_canceled().await {
                    return Err(GatewayError::Cancellation("job canceled".to_string()));
                }
                engine.enrich_one(&EnrichQuery::from(&book)).await
            }
        },
        move |completed, total, label, had_error| {
            tracing::debug!(completed, total, label, had_error, "batch enrichment progress");
            let handle = progress_handle.clone();
            let payload = json!({ "label": label, "completed": completed, "total": total });
            tokio::spawn(async move {
                if completed == total {
                    let _ = handle.push_final_progress(completed, payload).await;
                } else {
                    let _ = handle.push_progress(completed, payload).await;
                }
            });
        },
    )
    .await;

    let mut success_count = 0usize;
    let mut failure_count = 0usize;
    let enriched_books: Vec<serde_json::Value> = results
        .into_iter()
        .map(|result| match result {
            Ok(Some(work)) => {
                success_count += 1;
                serde_json::to_value(work).unwrap_or(serde_json::Value::Null)
            }
            Ok(None) => {
                failure_count += 1;
                serde_json::Value::Null
            }
            Err(err) => {
                failure_count += 1;
                json!({ "error": err.to_string() })
            }
        })
        .collect();

    if handle.is_canceled().await {
        return;
    }

    let payload = json!({
        "totalProcessed": total,
        "successCount": success_count,
        "failureCount": failure_count,
        "duration_ms": started.elapsed().as_millis() as u64,
        "enrichedBooks": enriched_books,
    });

    let _ = handle.complete(payload).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_gateway_cache::{InMemoryDurableStore, UnifiedCache};
    use book_gateway_coordinator::job_store::InMemoryJobStore;
    use book_gateway_core::config::TtlConfig;
    use book_gateway_core::models::{Edition, EditionFormat, Work};
    use book_gateway_providers::{NormalizedResponse, ProviderClient, ProviderError, ProviderMeta};

    struct StubProvider;

    #[async_trait::async_trait]
    impl ProviderClient for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search_by_title(
            &self,
            query: &str,
            _max: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            Ok((
                NormalizedResponse {
                    works: vec![Work {
                        title: query.to_string(),
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
                        quality_score: 0.4,
                    }],
                },
                ProviderMeta {
                    provider: "stub".to_string(),
                    raw_result_count: 1,
                },
            ))
        }

        async fn search_by_isbn(
            &self,
            _isbn: &str,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.search_by_title("isbn-hit", 1).await
        }

        async fn search_by_author(
            &self,
            name: &str,
            max: usize,
            _offset: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.search_by_title(name, max).await
        }
    }

    fn pipeline() -> BatchEnrichmentPipeline {
        let cache = Arc::new(UnifiedCache::new(
            Arc::new(InMemoryDurableStore::new()),
            1000,
            Duration::from_secs(60),
        ));
        let engine = Arc::new(EnrichmentEngine::new(
            Arc::new(StubProvider),
            Arc::new(StubProvider),
            Arc::new(StubProvider),
            cache,
            TtlConfig::default(),
        ));
        let registry = Arc::new(CoordinatorRegistry::new(Arc::new(InMemoryJobStore::new())));
        let limiter = Arc::new(RateLimiter::new());
        BatchEnrichmentPipeline::new(engine, registry, limiter, 100, 10)
    }

    #[tokio::test]
    async fn rejects_empty_batch() {
        let pipeline = pipeline();
        let result = pipeline.start("client-a", BatchEnrichmentRequest { books: vec![] }).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_batch_over_max_size() {
        let pipeline = pipeline();
        let books = (0..101)
            .map(|i| BookQuery {
                title: Some(format!("book {i}")),
                author: None,
                isbn: None,
            })
            .collect();
        let result = pipeline.start("client-a", BatchEnrichmentRequest { books }).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn start_reserves_a_job_and_binds_a_token() {
        let pipeline = pipeline();
        let books = vec![BookQuery {
            title: Some("Dune".to_string()),
            author: None,
            isbn: None,
        }];
        let outcome = pipeline
            .start("client-a", BatchEnrichmentRequest { books })
            .await
            .unwrap();
        assert_eq!(outcome.total_count, 1);
        assert!(outcome.token.expires_at > Utc::now());
    }
}
