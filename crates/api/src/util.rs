//! Small helpers shared across route handlers.

use actix_web::HttpRequest;

/// The rate limiter's partition key: an explicit `X-Client-Id` header when
/// present, else the caller's socket address.
pub fn client_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Client-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            req.peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        })
}
