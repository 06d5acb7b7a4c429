//! `ProviderClient` implementation backed by the Open Library search API.
//! Open Library requires no API key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::circuit_breaker::CircuitBreakerManager;
use crate::client::{NormalizedResponse, ProviderClient, ProviderMeta};
use crate::error::ProviderError;
use crate::normalize::open_library::{self, SearchResponse};
use crate::support::{classify_status, classify_transport_error, with_single_retry};

const PROVIDER: &str = "open_library";

pub struct OpenLibraryClient {
    http: Arc<Client>,
    base_url: String,
    timeout: Duration,
    breaker: Arc<CircuitBreakerManager>,
}

impl OpenLibraryClient {
    pub fn new(
        http: Arc<Client>,
        base_url: impl Into<String>,
        timeout: Duration,
        breaker: Arc<CircuitBreakerManager>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout,
            breaker,
        }
    }

    async fn fetch(&self, params: Vec<(&'static str, String)>) -> Result<SearchResponse, ProviderError> {
        let breaker = Arc::clone(&self.breaker);
        let http = Arc::clone(&self.http);
        let base_url = self.base_url.clone();
        let timeout = self.timeout;

        breaker
            .call_async(PROVIDER, move || {
                let http = Arc::clone(&http);
                let base_url = base_url.clone();
                let params = params.clone();
                async move {
                    with_single_retry(PROVIDER, || {
                        let http = Arc::clone(&http);
                        let base_url = base_url.clone();
                        let params = params.clone();
                        async move {
                            let response = http
                                .get(format!("{base_url}/search.json"))
                                .query(&params)
                                .timeout(timeout)
                                .send()
                                .await
                                .map_err(|e| classify_transport_error(PROVIDER, e))?;

                            classify_status(PROVIDER, response.status())?;

                            response
                                .json::<SearchResponse>()
                                .await
                                .map_err(|e| ProviderError::Malformed {
                                    provider: PROVIDER.to_string(),
                                    message: e.to_string(),
                                })
                        }
                    })
                    .await
                }
            })
            .await
    }
}

#[async_trait]
impl ProviderClient for OpenLibraryClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search_by_title(
        &self,
        query: &str,
        max: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self
            .fetch(vec![
                ("title", query.to_string()),
                ("limit", max.to_string()),
            ])
            .await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.num_found,
        };
        Ok((open_library::normalize(raw)?, meta))
    }

    async fn search_by_isbn(
        &self,
        isbn: &str,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self
            .fetch(vec![("isbn", isbn.to_string()), ("limit", "1".to_string())])
            .await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.num_found,
        };
        Ok((open_library::normalize(raw)?, meta))
    }

    async fn search_by_author(
        &self,
        name: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self
            .fetch(vec![
                ("author", name.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.num_found,
        };
        Ok((open_library::normalize(raw)?, meta))
    }
}
