//! The semantic error taxonomy shared across the Book Gateway crates.
//!
//! Every lower-level crate (`providers`, `cache`, `ratelimit`, `engine`,
//! `coordinator`, `pipelines`, `queue`) defines its own typed error enum and
//! converts into `GatewayError` at the boundary the `api` crate consumes, so
//! no crate upstream of `api` needs to know about HTTP status codes.

use thiserror::Error;

/// Semantic error categories from the error handling design.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(AuthErrorKind),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found")]
    NotFound,

    #[error("provider timeout: {provider}")]
    ProviderTimeout { provider: String },

    #[error("provider transient error: {provider}: {message}")]
    ProviderTransient { provider: String, message: String },

    #[error("provider permanent error: {provider}: {message}")]
    ProviderPermanent { provider: String, message: String },

    #[error("all providers unavailable")]
    ProviderUnavailable,

    #[error("cache payload corrupted: {0}")]
    CacheCorruption(String),

    #[error("operation canceled: {0}")]
    Cancellation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Auth-specific failure reasons, surfaced as a typed envelope on the
/// WebSocket path and as 401 on HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthErrorKind {
    #[error("token missing")]
    Missing,
    #[error("token invalid")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("refresh requested too early")]
    RefreshTooEarly,
    #[error("refresh already in progress")]
    RefreshInProgress,
}

impl GatewayError {
    /// Stable machine-readable error code, used in the HTTP envelope's
    /// `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::Auth(AuthErrorKind::Missing) => "AUTH_MISSING",
            GatewayError::Auth(AuthErrorKind::InvalidToken) => "AUTH_INVALID_TOKEN",
            GatewayError::Auth(AuthErrorKind::Expired) => "AUTH_EXPIRED",
            GatewayError::Auth(AuthErrorKind::RefreshTooEarly) => "REFRESH_TOO_EARLY",
            GatewayError::Auth(AuthErrorKind::RefreshInProgress) => "REFRESH_IN_PROGRESS",
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::NotFound => "NOT_FOUND",
            GatewayError::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            GatewayError::ProviderTransient { .. } => "PROVIDER_TRANSIENT",
            GatewayError::ProviderPermanent { .. } => "PROVIDER_PERMANENT",
            GatewayError::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            GatewayError::CacheCorruption(_) => "CACHE_CORRUPTION",
            GatewayError::Cancellation(_) => "CANCELED",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a fallback to the next provider in the chain is warranted.
    pub fn is_retryable_by_engine(&self) -> bool {
        matches!(
            self,
            GatewayError::ProviderTimeout { .. }
                | GatewayError::ProviderTransient { .. }
                | GatewayError::ProviderPermanent { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_code_is_stable() {
        let err = GatewayError::Validation("empty_batch".into());
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn provider_errors_are_retryable_by_engine() {
        assert!(GatewayError::ProviderTimeout {
            provider: "google_books".into()
        }
        .is_retryable_by_engine());
        assert!(GatewayError::ProviderPermanent {
            provider: "isbndb".into(),
            message: "bad request".into()
        }
        .is_retryable_by_engine());
        assert!(!GatewayError::ProviderUnavailable.is_retryable_by_engine());
    }
}
