//! `ProviderClient` implementation backed by the Google Books `volumes` API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use book_gateway_core::secrets::SecretSource;
use reqwest::Client;

use crate::circuit_breaker::CircuitBreakerManager;
use crate::client::{NormalizedResponse, ProviderClient, ProviderMeta};
use crate::error::ProviderError;
use crate::normalize::google_books::{self, VolumesResponse};
use crate::support::{classify_status, classify_transport_error, with_single_retry};

const PROVIDER: &str = "google_books";

pub struct GoogleBooksClient {
    http: Arc<Client>,
    base_url: String,
    api_key: SecretSource,
    timeout: Duration,
    breaker: Arc<CircuitBreakerManager>,
}

impl GoogleBooksClient {
    pub fn new(
        http: Arc<Client>,
        base_url: impl Into<String>,
        api_key: SecretSource,
        timeout: Duration,
        breaker: Arc<CircuitBreakerManager>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            timeout,
            breaker,
        }
    }

    async fn fetch(&self, query: &str, max: usize) -> Result<VolumesResponse, ProviderError> {
        let key = self
            .api_key
            .resolve()
            .await
            .map_err(|e| ProviderError::Permanent {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let breaker = Arc::clone(&self.breaker);
        let http = Arc::clone(&self.http);
        let base_url = self.base_url.clone();
        let timeout = self.timeout;
        let query = query.to_string();

        breaker
            .call_async(PROVIDER, move || {
                let http = Arc::clone(&http);
                let base_url = base_url.clone();
                let query = query.clone();
                let key = key.clone();
                async move {
                    with_single_retry(PROVIDER, || {
                        let http = Arc::clone(&http);
                        let base_url = base_url.clone();
                        let query = query.clone();
                        let key = key.clone();
                        async move {
                            let response = http
                                .get(format!("{base_url}/volumes"))
                                .query(&[
                                    ("q", query.as_str()),
                                    ("maxResults", &max.min(40).to_string()),
                                    ("key", key.as_str()),
                                ])
                                .timeout(timeout)
                                .send()
                                .await
                                .map_err(|e| classify_transport_error(PROVIDER, e))?;

                            classify_status(PROVIDER, response.status())?;

                            response
                                .json::<VolumesResponse>()
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
impl ProviderClient for GoogleBooksClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search_by_title(
        &self,
        query: &str,
        max: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self.fetch(query, max).await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.total_items,
        };
        Ok((google_books::normalize(raw)?, meta))
    }

    async fn search_by_isbn(
        &self,
        isbn: &str,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self.fetch(&format!("isbn:{isbn}"), 1).await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.total_items,
        };
        Ok((google_books::normalize(raw)?, meta))
    }

    async fn search_by_author(
        &self,
        name: &str,
        limit: usize,
        _offset: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self.fetch(&format!("inauthor:{name}"), limit).await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.total_items,
        };
        Ok((google_books::normalize(raw)?, meta))
    }
}
