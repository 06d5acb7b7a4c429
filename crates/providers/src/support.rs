//! Shared HTTP plumbing for provider clients: status-code classification
//! and a single capped-backoff retry before surfacing the failure.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::warn;

use crate::error::ProviderError;

/// Classify a completed HTTP response's status into the provider error
/// taxonomy. `Ok(())` means the response should be parsed as a success body.
pub fn classify_status(provider: &'static str, status: StatusCode) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            provider: provider.to_string(),
            retry_after_secs: 60,
        });
    }
    if status.is_server_error() {
        return Err(ProviderError::Transient {
            provider: provider.to_string(),
            message: format!("http {status}"),
        });
    }
    Err(ProviderError::Permanent {
        provider: provider.to_string(),
        message: format!("http {status}"),
    })
}

fn is_network_error_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

pub fn classify_transport_error(provider: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout {
            provider: provider.to_string(),
        };
    }
    if is_network_error_retryable(&err) {
        return ProviderError::Transient {
            provider: provider.to_string(),
            message: err.to_string(),
        };
    }
    ProviderError::Permanent {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}

/// Run `attempt` once; on a retryable failure, wait a short fixed backoff
/// and run it once more. The engine's own fallback chain absorbs any
/// failure that survives this retry, so the backoff stays short.
pub async fn with_single_retry<F, Fut, T>(provider: &'static str, mut attempt: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            warn!(provider, error = %err, "retrying after transient provider failure");
            sleep(Duration::from_millis(250)).await;
            attempt().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_status_carries_retry_hint() {
        let err = classify_status("google_books", StatusCode::TOO_MANY_REQUESTS).unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 60, .. }));
    }

    #[test]
    fn server_error_is_transient() {
        let err = classify_status("isbndb", StatusCode::INTERNAL_SERVER_ERROR).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn client_error_is_permanent() {
        let err = classify_status("open_library", StatusCode::NOT_FOUND).unwrap_err();
        assert!(!err.is_retryable());
    }
}
