//! Central configuration, loaded the way `discovery::config::DiscoveryConfig`
//! loads its own config: `config`-crate layered sources plus `dotenvy` for
//! local `.env` overrides.

use serde::Deserialize;
use std::time::Duration;

/// Top-level runtime configuration: rate limiting, batch/size limits,
/// provider timeouts, job cleanup, auth token lifetime, and cache TTLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub rate_limit: RateLimitConfig,
    pub batch: BatchConfig,
    pub provider: ProviderConfig,
    pub job: JobConfig,
    pub auth: AuthConfig,
    pub ttl: TtlConfig,
    pub server: ServerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            batch: BatchConfig::default(),
            provider: ProviderConfig::default(),
            job: JobConfig::default(),
            auth: AuthConfig::default(),
            ttl: TtlConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            max_requests: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_books: usize,
    pub max_image_bytes: usize,
    pub max_csv_bytes: usize,
    pub max_batch_photos: usize,
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_books: 100,
            max_image_bytes: 5 * 1024 * 1024,
            max_csv_bytes: 10 * 1024 * 1024,
            max_batch_photos: 5,
            concurrency: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub cleanup_after_hours: i64,
    pub persist_timeout_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cleanup_after_hours: 24,
            persist_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_hours: i64,
    pub refresh_window_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 2,
            refresh_window_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub title_days: i64,
    pub isbn_days: i64,
    pub author_days: i64,
    pub enrichment_days: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            title_days: 7,
            isbn_days: 365,
            author_days: 7,
            enrichment_days: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from (in increasing priority) built-in defaults,
    /// an optional `config/gateway.yaml`, and environment variables
    /// prefixed `BOOKGW_`.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/gateway").required(false))
            .add_source(config::Environment::with_prefix("BOOKGW").separator("__"));

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.rate_limit.window_seconds, 60);
        assert_eq!(cfg.rate_limit.max_requests, 10);
        assert_eq!(cfg.batch.max_batch_books, 100);
        assert_eq!(cfg.batch.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.batch.max_csv_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.batch.max_batch_photos, 5);
        assert_eq!(cfg.batch.concurrency, 10);
        assert_eq!(cfg.provider.timeout_ms, 10_000);
        assert_eq!(cfg.job.cleanup_after_hours, 24);
        assert_eq!(cfg.auth.token_ttl_hours, 2);
        assert_eq!(cfg.auth.refresh_window_minutes, 30);
        assert_eq!(cfg.ttl.title_days, 7);
        assert_eq!(cfg.ttl.isbn_days, 365);
        assert_eq!(cfg.ttl.author_days, 7);
        assert_eq!(cfg.ttl.enrichment_days, 180);
    }
}
