//! The process-wide outbound HTTP client, built once and shared via `Arc`
//! rather than constructed per request, so connection pooling actually helps.

use std::sync::Arc;
use std::time::Duration;

/// Construct the shared client with a connect timeout tuned for
/// third-party provider latency; per-request timeouts are applied by the
/// caller via `RequestBuilder::timeout`.
pub fn build_shared_client() -> Arc<reqwest::Client> {
    Arc::new(
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("book-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client configuration is static and always valid"),
    )
}
