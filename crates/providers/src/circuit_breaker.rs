//! Per-provider circuit breaker: one `failsafe::CircuitBreaker` per
//! provider name, created lazily and cached behind a `DashMap` lookup.

use dashmap::DashMap;
use failsafe::{CircuitBreaker, Config as FailsafeConfig, Error as FailsafeError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ProviderError;

pub struct CircuitBreakerManager {
    breakers: DashMap<String, CircuitBreaker>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreakerManager {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold,
            timeout,
        }
    }

    fn get_or_create(&self, provider: &str) -> CircuitBreaker {
        if let Some(existing) = self.breakers.get(provider) {
            return existing.clone();
        }

        let breaker = self.create(provider);
        self.breakers
            .entry(provider.to_string())
            .or_insert(breaker)
            .clone()
    }

    fn create(&self, provider: &str) -> CircuitBreaker {
        let config = FailsafeConfig::new()
            .failure_threshold(self.failure_threshold)
            .timeout(self.timeout);

        debug!(provider, failure_threshold = self.failure_threshold, "created circuit breaker");
        CircuitBreaker::new(config)
    }

    /// Run `operation` through the provider's breaker.
    pub fn call<F, T>(&self, provider: &'static str, operation: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Result<T, ProviderError>,
    {
        let breaker = self.get_or_create(provider);

        match breaker.call(operation) {
            Ok(result) => Ok(result),
            Err(FailsafeError::Rejected) => {
                warn!(provider, "circuit breaker open");
                Err(ProviderError::CircuitOpen {
                    provider: provider.to_string(),
                })
            }
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Run an async `operation` through the provider's breaker. `call` only
    /// wraps synchronous closures, so for awaited futures we manually check
    /// admission and record the outcome, the same permit/record-outcome
    /// split `call` performs internally.
    pub async fn call_async<F, Fut, T>(
        &self,
        provider: &'static str,
        operation: F,
    ) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let breaker = self.get_or_create(provider);

        if !breaker.is_call_permitted() {
            warn!(provider, "circuit breaker open");
            return Err(ProviderError::CircuitOpen {
                provider: provider.to_string(),
            });
        }

        match operation().await {
            Ok(value) => {
                breaker.on_success();
                Ok(value)
            }
            Err(err) => {
                breaker.on_error();
                Err(err)
            }
        }
    }

    pub fn state(&self, provider: &str) -> Option<&'static str> {
        self.breakers.get(provider).map(|b| {
            if b.is_open() {
                "open"
            } else if b.is_half_open() {
                "half_open"
            } else {
                "closed"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_breaker_allows_calls_through() {
        let manager = CircuitBreakerManager::new(5, Duration::from_secs(2));
        let result: Result<&str, ProviderError> =
            manager.call("google_books", || Ok("ok"));
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn breaker_opens_after_repeated_failures() {
        let manager = CircuitBreakerManager::new(2, Duration::from_secs(30));

        for _ in 0..2 {
            let _: Result<(), ProviderError> = manager.call("isbndb", || {
                Err(ProviderError::Transient {
                    provider: "isbndb".into(),
                    message: "boom".into(),
                })
            });
        }

        let result: Result<(), ProviderError> = manager.call("isbndb", || Ok(()));
        assert!(matches!(result, Err(ProviderError::CircuitOpen { .. })));
    }
}
