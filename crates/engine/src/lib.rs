//! # Book Gateway Engine
//!
//! The multi-provider enrichment engine, with its ordered provider
//! fallback chain and two-tier cache integration, and the generic
//! bounded-concurrency batch executor used by the pipeline layer.

pub mod batch;
pub mod merge;

use std::sync::Arc;
use std::time::Duration;

use book_gateway_cache::{keys, ttl, CacheSource, UnifiedCache};
use book_gateway_core::error::GatewayError;
use book_gateway_core::models::Work;
use book_gateway_providers::{NormalizedResponse, ProviderClient};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// A lookup query; exactly one of `isbn`/`title`/`author` should be set,
/// `isbn` takes priority when more than one field is set.
#[derive(Debug, Clone, Default)]
pub struct EnrichQuery {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl EnrichQuery {
    pub fn by_isbn(isbn: impl Into<String>) -> Self {
        Self {
            isbn: Some(isbn.into()),
            ..Default::default()
        }
    }

    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn by_author(author: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub works: Vec<Work>,
}

struct ProviderChain {
    google_books: Arc<dyn ProviderClient>,
    open_library: Arc<dyn ProviderClient>,
    isbndb: Arc<dyn ProviderClient>,
}

pub struct EnrichmentEngine {
    providers: ProviderChain,
    cache: Arc<UnifiedCache>,
    ttl_config: book_gateway_core::config::TtlConfig,
    in_flight: DashMap<String, Arc<AsyncMutex<()>>>,
}

struct CleanupGuard<'a> {
    map: &'a DashMap<String, Arc<AsyncMutex<()>>>,
    key: String,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

impl EnrichmentEngine {
    pub fn new(
        google_books: Arc<dyn ProviderClient>,
        open_library: Arc<dyn ProviderClient>,
        isbndb: Arc<dyn ProviderClient>,
        cache: Arc<UnifiedCache>,
        ttl_config: book_gateway_core::config::TtlConfig,
    ) -> Self {
        Self {
            providers: ProviderChain {
                google_books,
                open_library,
                isbndb,
            },
            cache,
            ttl_config,
            in_flight: DashMap::new(),
        }
    }

    /// `EnrichOne({isbn?, title?, author?}) -> EnrichedRecord | not_found`.
    pub async fn enrich_one(&self, query: &EnrichQuery) -> Result<Option<Work>, GatewayError> {
        let works = self.resolve(query, 1).await?;
        Ok(works.into_iter().next())
    }

    /// `EnrichMany(query, max) -> {works[], editions[], authors[]}`, here
    /// flattened into `Work.editions`/`Work.authors` per the canonical
    /// model.
    pub async fn enrich_many(
        &self,
        query: &EnrichQuery,
        max: usize,
    ) -> Result<EnrichmentResult, GatewayError> {
        let works = self.resolve(query, max).await?;
        Ok(EnrichmentResult { works })
    }

    fn cache_key(&self, query: &EnrichQuery, max: usize) -> String {
        if let Some(isbn) = &query.isbn {
            keys::search_isbn(isbn)
        } else if let Some(title) = &query.title {
            keys::search_title(title, max)
        } else if let Some(author) = &query.author {
            keys::search_author(author, max, 0)
        } else {
            "search:invalid".to_string()
        }
    }

    fn ttl_class(&self, query: &EnrichQuery) -> ttl::TtlClass {
        if query.isbn.is_some() {
            ttl::TtlClass::Isbn
        } else if query.author.is_some() {
            ttl::TtlClass::Author
        } else {
            ttl::TtlClass::Title
        }
    }

    async fn resolve(&self, query: &EnrichQuery, max: usize) -> Result<Vec<Work>, GatewayError> {
        if query.isbn.is_none() && query.title.is_none() && query.author.is_none() {
            return Err(GatewayError::Validation(
                "query must specify isbn, title, or author".to_string(),
            ));
        }

        let cache_key = self.cache_key(query, max);

        if let Some(works) = self.read_cache(&cache_key).await? {
            return Ok(works);
        }

        // Single-flight: at most one provider fetch in flight per key.
        let lock = self
            .in_flight
            .entry(cache_key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = lock.lock().await;
        let _cleanup = CleanupGuard {
            map: &self.in_flight,
            key: cache_key.clone(),
        };

        if let Some(works) = self.read_cache(&cache_key).await? {
            return Ok(works);
        }

        let works = self.fan_out(query, max).await?;

        let quality = works
            .iter()
            .map(|w| w.quality_score)
            .fold(0.0_f32, f32::max);
        let ttl = ttl::effective_ttl(self.ttl_class(query), &self.ttl_config, quality);
        let source_provider = works
            .first()
            .map(|w| w.primary_provider.clone())
            .unwrap_or_else(|| "none".to_string());

        let payload = serde_json::to_value(&works).map_err(|e| GatewayError::Internal(e.to_string()))?;
        self.cache
            .put(&cache_key, payload, ttl, source_provider, quality)
            .await
            .map_err(GatewayError::from)?;

        Ok(works)
    }

    async fn read_cache(&self, key: &str) -> Result<Option<Vec<Work>>, GatewayError> {
        match self.cache.get(key).await.map_err(GatewayError::from)? {
            Some((entry, meta)) => {
                let works: Vec<Work> = serde_json::from_value(entry.payload)
                    .map_err(|e| GatewayError::CacheCorruption(e.to_string()))?;
                debug!(
                    key,
                    source = ?meta.source,
                    hit_tier = matches!(meta.source, CacheSource::Edge),
                    "enrichment cache hit"
                );
                Ok(Some(works))
            }
            None => Ok(None),
        }
    }

    /// Tries GoogleBooks, OpenLibrary, then ISBNdb in order, stopping at
    /// the first non-empty result. A retryable failure falls through to
    /// the next provider; a non-retryable failure surfaces immediately.
    /// If every provider fails, the error is `ProviderUnavailable`; if
    /// every provider succeeds with an empty result, the caller sees
    /// `not_found` (an empty `Vec`).
    async fn fan_out(&self, query: &EnrichQuery, max: usize) -> Result<Vec<Work>, GatewayError> {
        let chain = [
            &self.providers.google_books,
            &self.providers.open_library,
            &self.providers.isbndb,
        ];

        let mut any_failed = false;

        for provider in chain {
            let attempt = self.call_provider(provider.as_ref(), query, max).await;
            match attempt {
                Ok(NormalizedResponse { works }) if !works.is_empty() => return Ok(works),
                Ok(_) => continue,
                Err(err) if err.is_retryable() => {
                    warn!(provider = provider.name(), error = %err, "provider failed, falling through");
                    any_failed = true;
                    continue;
                }
                Err(err) => {
                    return Err(err.into());
                }
            }
        }

        if any_failed {
            Err(GatewayError::ProviderUnavailable)
        } else {
            Ok(Vec::new())
        }
    }

    async fn call_provider(
        &self,
        provider: &dyn ProviderClient,
        query: &EnrichQuery,
        max: usize,
    ) -> Result<NormalizedResponse, book_gateway_providers::ProviderError> {
        if let Some(isbn) = &query.isbn {
            provider.search_by_isbn(isbn).await.map(|(r, _)| r)
        } else if let Some(title) = &query.title {
            provider.search_by_title(title, max).await.map(|(r, _)| r)
        } else {
            let author = query.author.as_deref().unwrap_or_default();
            provider
                .search_by_author(author, max, 0)
                .await
                .map(|(r, _)| r)
        }
    }
}

/// Used by batch-warming paths that merge results observed from more than
/// one provider for the same ISBN: prefers the higher-scoring record's
/// scalar fields, but unions subject_tags and contributors.
pub fn merge_by_quality(a: Work, b: Work) -> Work {
    merge::merge_by_quality(a, b)
}

/// Shared connect/per-request timeout default used when wiring concrete
/// provider clients.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use book_gateway_cache::InMemoryDurableStore;
    use book_gateway_core::config::TtlConfig;
    use book_gateway_core::models::{Edition, EditionFormat};
    use book_gateway_providers::{ProviderError, ProviderMeta};

    struct StubProvider {
        name: &'static str,
        works: Vec<Work>,
        fail: Option<ProviderError>,
    }

    fn work(title: &str, provider: &'static str) -> Work {
        Work {
            title: title.to_string(),
            subject_tags: vec![],
            description: None,
            first_publication_year: None,
            authors: vec![],
            editions: vec![Edition {
                isbn: Some("9780441013593".to_string()),
                isbn_list: vec![],
                publisher: None,
                publication_year: None,
                format: EditionFormat::Unknown,
                cover_url: None,
                primary_provider: provider.to_string(),
            }],
            synthetic: true,
            primary_provider: provider.to_string(),
            contributors: [provider.to_string()].into_iter().collect(),
            google_books_volume_ids: vec![],
            open_library_work_ids: vec![],
            isbndb_ids: vec![],
            quality_score: 0.8,
        }
    }

    #[async_trait]
    impl ProviderClient for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search_by_title(
            &self,
            _query: &str,
            _max: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.respond()
        }

        async fn search_by_isbn(
            &self,
            _isbn: &str,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.respond()
        }

        async fn search_by_author(
            &self,
            _name: &str,
            _limit: usize,
            _offset: usize,
        ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            self.respond()
        }
    }

    impl StubProvider {
        fn respond(&self) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
            if let Some(err) = &self.fail {
                return Err(clone_err(err));
            }
            Ok((
                NormalizedResponse {
                    works: self.works.clone(),
                },
                ProviderMeta {
                    provider: self.name.to_string(),
                    raw_result_count: self.works.len(),
                },
            ))
        }
    }

    fn clone_err(err: &ProviderError) -> ProviderError {
        match err {
            ProviderError::Timeout { provider } => ProviderError::Timeout {
                provider: provider.clone(),
            },
            ProviderError::Transient { provider, message } => ProviderError::Transient {
                provider: provider.clone(),
                message: message.clone(),
            },
            _ => ProviderError::Transient {
                provider: "test".to_string(),
                message: "unsupported clone in test".to_string(),
            },
        }
    }

    fn engine(
        google_books: StubProvider,
        open_library: StubProvider,
        isbndb: StubProvider,
    ) -> EnrichmentEngine {
        let cache = Arc::new(UnifiedCache::new(
            Arc::new(InMemoryDurableStore::new()),
            1000,
            Duration::from_secs(60),
        ));
        EnrichmentEngine::new(
            Arc::new(google_books),
            Arc::new(open_library),
            Arc::new(isbndb),
            cache,
            TtlConfig::default(),
        )
    }

    #[tokio::test]
    async fn falls_through_empty_result_to_next_provider() {
        let engine = engine(
            StubProvider {
                name: "google_books",
                works: vec![],
                fail: None,
            },
            StubProvider {
                name: "open_library",
                works: vec![work("Dune", "open_library")],
                fail: None,
            },
            StubProvider {
                name: "isbndb",
                works: vec![],
                fail: None,
            },
        );

        let result = engine
            .enrich_one(&EnrichQuery::by_title("Dune"))
            .await
            .unwrap();
        assert_eq!(result.unwrap().primary_provider, "open_library");
    }

    #[tokio::test]
    async fn retryable_failure_falls_through() {
        let engine = engine(
            StubProvider {
                name: "google_books",
                works: vec![],
                fail: Some(ProviderError::Timeout {
                    provider: "google_books".to_string(),
                }),
            },
            StubProvider {
                name: "open_library",
                works: vec![work("Dune", "open_library")],
                fail: None,
            },
            StubProvider {
                name: "isbndb",
                works: vec![],
                fail: None,
            },
        );

        let result = engine
            .enrich_one(&EnrichQuery::by_isbn("9780441013593"))
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn all_providers_failing_returns_unavailable() {
        let timeout = || {
            Some(ProviderError::Timeout {
                provider: "x".to_string(),
            })
        };
        let engine = engine(
            StubProvider {
                name: "google_books",
                works: vec![],
                fail: timeout(),
            },
            StubProvider {
                name: "open_library",
                works: vec![],
                fail: timeout(),
            },
            StubProvider {
                name: "isbndb",
                works: vec![],
                fail: timeout(),
            },
        );

        let result = engine.enrich_one(&EnrichQuery::by_title("Dune")).await;
        assert!(matches!(result, Err(GatewayError::ProviderUnavailable)));
    }

    #[tokio::test]
    async fn all_empty_returns_not_found() {
        let engine = engine(
            StubProvider {
                name: "google_books",
                works: vec![],
                fail: None,
            },
            StubProvider {
                name: "open_library",
                works: vec![],
                fail: None,
            },
            StubProvider {
                name: "isbndb",
                works: vec![],
                fail: None,
            },
        );

        let result = engine.enrich_one(&EnrichQuery::by_title("Dune")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let engine = engine(
            StubProvider {
                name: "google_books",
                works: vec![work("Dune", "google_books")],
                fail: None,
            },
            StubProvider {
                name: "open_library",
                works: vec![],
                fail: None,
            },
            StubProvider {
                name: "isbndb",
                works: vec![],
                fail: None,
            },
        );

        let first = engine.enrich_one(&EnrichQuery::by_title("Dune")).await.unwrap();
        let second = engine.enrich_one(&EnrichQuery::by_title("Dune")).await.unwrap();
        assert_eq!(first.unwrap().title, second.unwrap().title);
    }
}
