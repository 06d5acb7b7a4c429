//! `ProviderClient` implementation backed by the ISBNdb API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use book_gateway_core::secrets::SecretSource;
use reqwest::Client;

use crate::circuit_breaker::CircuitBreakerManager;
use crate::client::{NormalizedResponse, ProviderClient, ProviderMeta};
use crate::error::ProviderError;
use crate::normalize::isbndb::{self, Book, BookResponse, BooksResponse};
use crate::support::{classify_status, classify_transport_error, with_single_retry};

const PROVIDER: &str = "isbndb";

pub struct IsbndbClient {
    http: Arc<Client>,
    base_url: String,
    api_key: SecretSource,
    timeout: Duration,
    breaker: Arc<CircuitBreakerManager>,
}

impl IsbndbClient {
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

    async fn authorization_header(&self) -> Result<String, ProviderError> {
        self.api_key
            .resolve()
            .await
            .map_err(|e| ProviderError::Permanent {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })
    }

    async fn get_book(&self, isbn: &str) -> Result<Book, ProviderError> {
        let key = self.authorization_header().await?;
        let breaker = Arc::clone(&self.breaker);
        let http = Arc::clone(&self.http);
        let url = format!("{}/book/{}", self.base_url, isbn);
        let timeout = self.timeout;

        breaker
            .call_async(PROVIDER, move || {
                let http = Arc::clone(&http);
                let url = url.clone();
                let key = key.clone();
                async move {
                    with_single_retry(PROVIDER, || {
                        let http = Arc::clone(&http);
                        let url = url.clone();
                        let key = key.clone();
                        async move {
                            let response = http
                                .get(&url)
                                .header("Authorization", key)
                                .timeout(timeout)
                                .send()
                                .await
                                .map_err(|e| classify_transport_error(PROVIDER, e))?;

                            if response.status() == reqwest::StatusCode::NOT_FOUND {
                                return Err(ProviderError::NotFound {
                                    provider: PROVIDER.to_string(),
                                });
                            }
                            classify_status(PROVIDER, response.status())?;

                            let parsed = response
                                .json::<BookResponse>()
                                .await
                                .map_err(|e| ProviderError::Malformed {
                                    provider: PROVIDER.to_string(),
                                    message: e.to_string(),
                                })?;
                            Ok(parsed.book)
                        }
                    })
                    .await
                }
            })
            .await
    }

    async fn search_books(
        &self,
        endpoint: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<BooksResponse, ProviderError> {
        let key = self.authorization_header().await?;
        let breaker = Arc::clone(&self.breaker);
        let http = Arc::clone(&self.http);
        let url = format!("{}/{}", self.base_url, endpoint);
        let timeout = self.timeout;

        breaker
            .call_async(PROVIDER, move || {
                let http = Arc::clone(&http);
                let url = url.clone();
                let key = key.clone();
                let params = params.clone();
                async move {
                    with_single_retry(PROVIDER, || {
                        let http = Arc::clone(&http);
                        let url = url.clone();
                        let key = key.clone();
                        let params = params.clone();
                        async move {
                            let response = http
                                .get(&url)
                                .header("Authorization", key)
                                .query(&params)
                                .timeout(timeout)
                                .send()
                                .await
                                .map_err(|e| classify_transport_error(PROVIDER, e))?;

                            classify_status(PROVIDER, response.status())?;

                            response
                                .json::<BooksResponse>()
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
impl ProviderClient for IsbndbClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search_by_title(
        &self,
        query: &str,
        max: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self
            .search_books(
                &format!("books/{query}"),
                vec![("pageSize", max.to_string())],
            )
            .await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.books.len(),
        };
        Ok((isbndb::normalize_many(raw.books)?, meta))
    }

    async fn search_by_isbn(
        &self,
        isbn: &str,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let book = self.get_book(isbn).await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: 1,
        };
        Ok((isbndb::normalize_one(book)?, meta))
    }

    async fn search_by_author(
        &self,
        name: &str,
        limit: usize,
        _offset: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError> {
        let raw = self
            .search_books(
                &format!("author/{name}"),
                vec![("pageSize", limit.to_string())],
            )
            .await?;
        let meta = ProviderMeta {
            provider: PROVIDER.to_string(),
            raw_result_count: raw.books.len(),
        };
        Ok((isbndb::normalize_many(raw.books)?, meta))
    }
}
