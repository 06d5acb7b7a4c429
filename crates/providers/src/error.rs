//! Typed provider failure kinds: one `thiserror` enum per crate boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: request timed out")]
    Timeout { provider: String },

    #[error("{provider}: transient failure: {message}")]
    Transient { provider: String, message: String },

    #[error("{provider}: permanent failure: {message}")]
    Permanent { provider: String, message: String },

    #[error("{provider}: rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("{provider}: no results")]
    NotFound { provider: String },

    #[error("{provider}: circuit breaker open")]
    CircuitOpen { provider: String },

    #[error("{provider}: malformed response: {message}")]
    Malformed { provider: String, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Timeout { provider }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Permanent { provider, .. }
            | ProviderError::RateLimited { provider, .. }
            | ProviderError::NotFound { provider }
            | ProviderError::CircuitOpen { provider }
            | ProviderError::Malformed { provider, .. } => provider,
        }
    }

    /// Network/DNS/TLS errors, HTTP >= 500, malformed JSON, timeouts, and an
    /// open circuit breaker are worth falling through to the next provider
    /// for; a permanent 4xx (other than 429, which carries its own
    /// `retry_after` hint) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. }
                | ProviderError::Transient { .. }
                | ProviderError::CircuitOpen { .. }
                | ProviderError::Malformed { .. }
        )
    }
}

impl From<ProviderError> for book_gateway_core::GatewayError {
    fn from(err: ProviderError) -> Self {
        use book_gateway_core::GatewayError;
        match err {
            ProviderError::Timeout { provider } => GatewayError::ProviderTimeout { provider },
            ProviderError::Transient { provider, message }
            | ProviderError::Malformed { provider, message } => {
                GatewayError::ProviderTransient { provider, message }
            }
            ProviderError::Permanent { provider, message } => {
                GatewayError::ProviderPermanent { provider, message }
            }
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => GatewayError::RateLimited { retry_after_secs },
            ProviderError::NotFound { .. } => GatewayError::NotFound,
            ProviderError::CircuitOpen { provider } => GatewayError::ProviderTransient {
                provider,
                message: "circuit breaker open".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod gateway_conversion_tests {
    use super::*;
    use book_gateway_core::GatewayError;

    #[test]
    fn not_found_maps_to_gateway_not_found() {
        let err: GatewayError = ProviderError::NotFound {
            provider: "open_library".into(),
        }
        .into();
        assert!(matches!(err, GatewayError::NotFound));
    }
}
