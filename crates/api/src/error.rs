//! Translates `GatewayError` into the HTTP error envelope and a status
//! code, per the exit/status code table: 400 validation, 401 auth,
//! 404 unknown job, 429 rate-limited (with `Retry-After`), 500 internal,
//! 503 provider unavailable.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use book_gateway_core::envelope::HttpEnvelope;
use book_gateway_core::error::{AuthErrorKind, GatewayError};
use std::fmt;

#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::ProviderTimeout { .. }
            | GatewayError::ProviderTransient { .. }
            | GatewayError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ProviderPermanent { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::CacheCorruption(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Cancellation(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let GatewayError::RateLimited { retry_after_secs } = &self.0 {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }

        let details = match &self.0 {
            GatewayError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after": retry_after_secs }))
            }
            GatewayError::Auth(kind) => Some(serde_json::json!({ "reason": auth_reason(*kind) })),
            _ => None,
        };

        builder.json(HttpEnvelope::<()>::error(self.0.code(), self.0.to_string(), details))
    }
}

fn auth_reason(kind: AuthErrorKind) -> &'static str {
    match kind {
        AuthErrorKind::Missing => "missing_token",
        AuthErrorKind::InvalidToken => "invalid_token",
        AuthErrorKind::Expired => "expired",
        AuthErrorKind::RefreshTooEarly => "refresh_too_early",
        AuthErrorKind::RefreshInProgress => "refresh_in_progress",
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
