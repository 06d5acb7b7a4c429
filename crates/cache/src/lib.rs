//! # Book Gateway Cache
//!
//! `UnifiedCache`: a two-tier cache (in-process `moka` edge tier over a
//! durable tier) with deterministic keying, quality-biased TTLs, and
//! single-flight coalescing on durable-tier misses.

pub mod durable;
pub mod error;
pub mod keys;
pub mod ttl;

use std::sync::Arc;
use std::time::Duration;

use book_gateway_core::models::CacheEntry;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

pub use durable::{DurableStore, InMemoryDurableStore, RedisStore};
pub use error::CacheError;
pub use ttl::TtlClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Edge,
    Durable,
}

#[derive(Debug, Clone)]
pub struct CacheMeta {
    pub source: CacheSource,
    pub age: chrono::Duration,
}

type InFlightMap = DashMap<String, Arc<AsyncMutex<()>>>;

/// RAII guard removing the in-flight marker for `key` on drop, even on
/// early return or panic; directly grounded on the reference multi-tier
/// cache manager's `CleanupGuard`.
struct CleanupGuard<'a> {
    map: &'a InFlightMap,
    key: String,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

pub struct UnifiedCache {
    edge: moka::future::Cache<String, Arc<CacheEntry>>,
    durable: Arc<dyn DurableStore>,
    in_flight: InFlightMap,
}

impl UnifiedCache {
    /// `edge_max_capacity` bounds entry count; `edge_ttl` is clamped to
    /// at most one hour regardless of what's requested.
    pub fn new(durable: Arc<dyn DurableStore>, edge_max_capacity: u64, edge_ttl: Duration) -> Self {
        let edge_ttl = edge_ttl.min(Duration::from_secs(3600));
        let edge = moka::future::Cache::builder()
            .max_capacity(edge_max_capacity)
            .time_to_live(edge_ttl)
            .build();
        Self {
            edge,
            durable,
            in_flight: DashMap::new(),
        }
    }

    /// `Get(key) -> (value, meta{source, age}) | miss`.
    pub async fn get(&self, key: &str) -> Result<Option<(CacheEntry, CacheMeta)>, CacheError> {
        if let Some(entry) = self.edge.get(key).await {
            let age = Utc::now() - entry.stored_at;
            return Ok(Some((
                (*entry).clone(),
                CacheMeta {
                    source: CacheSource::Edge,
                    age,
                },
            )));
        }

        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = lock.lock().await;
        let _cleanup = CleanupGuard {
            map: &self.in_flight,
            key: key.to_string(),
        };

        // Re-check the edge tier: a concurrent caller may have already
        // populated it while we waited for the lock.
        if let Some(entry) = self.edge.get(key).await {
            let age = Utc::now() - entry.stored_at;
            return Ok(Some((
                (*entry).clone(),
                CacheMeta {
                    source: CacheSource::Edge,
                    age,
                },
            )));
        }

        let Some(bytes) = durable::get_or_warn(&self.durable, key).await else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        if entry.is_expired(Utc::now()) {
            debug!(key, "durable entry expired, treating as miss");
            return Ok(None);
        }

        let age = entry.age(Utc::now());
        self.edge.insert(key.to_string(), Arc::new(entry.clone())).await;

        Ok(Some((
            entry,
            CacheMeta {
                source: CacheSource::Durable,
                age,
            },
        )))
    }

    /// `Put(key, value, ttl, quality)`. Writes both tiers; a durable-tier
    /// write failure is logged and does not fail the call, since the edge
    /// tier still serves the value for its (shorter) lifetime.
    pub async fn put(
        &self,
        key: &str,
        payload: serde_json::Value,
        ttl: Duration,
        source_provider: impl Into<String>,
        quality_score: f32,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            payload,
            stored_at: Utc::now(),
            ttl_secs: ttl.as_secs() as i64,
            source_provider: source_provider.into(),
            quality_score,
        };

        self.edge.insert(key.to_string(), Arc::new(entry.clone())).await;

        let bytes = serde_json::to_vec(&entry).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        if let Err(err) = self.durable.put_raw(key, bytes, ttl).await {
            warn!(key, error = %err, "durable cache tier unavailable on write");
        }

        Ok(())
    }

    /// Drops every key sharing `prefix` from both tiers; test/admin-only.
    pub async fn invalidate_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let prefix_owned = prefix.to_string();
        let _ = self
            .edge
            .invalidate_entries_if(move |k, _v| k.starts_with(&prefix_owned));
        self.durable.remove_prefix(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> UnifiedCache {
        UnifiedCache::new(
            Arc::new(InMemoryDurableStore::new()),
            1000,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn miss_then_put_then_hit_from_edge() {
        let cache = cache();
        assert!(cache.get("book:isbn:123").await.unwrap().is_none());

        cache
            .put("book:isbn:123", json!({"title": "Dune"}), Duration::from_secs(60), "google_books", 0.9)
            .await
            .unwrap();

        let (entry, meta) = cache.get("book:isbn:123").await.unwrap().unwrap();
        assert_eq!(entry.payload["title"], "Dune");
        assert_eq!(meta.source, CacheSource::Edge);
    }

    #[tokio::test]
    async fn durable_hit_promotes_to_edge() {
        let durable = Arc::new(InMemoryDurableStore::new());
        let cache = UnifiedCache::new(durable.clone(), 1000, Duration::from_secs(60));

        let entry = CacheEntry {
            payload: json!({"title": "Direct durable write"}),
            stored_at: Utc::now(),
            ttl_secs: 3600,
            source_provider: "isbndb".to_string(),
            quality_score: 0.5,
        };
        let bytes = serde_json::to_vec(&entry).unwrap();
        durable.put_raw("book:isbn:999", bytes, Duration::from_secs(3600)).await.unwrap();

        let (_, meta) = cache.get("book:isbn:999").await.unwrap().unwrap();
        assert_eq!(meta.source, CacheSource::Durable);

        let (_, meta_again) = cache.get("book:isbn:999").await.unwrap().unwrap();
        assert_eq!(meta_again.source, CacheSource::Edge);
    }

    #[tokio::test]
    async fn invalidate_by_prefix_clears_both_tiers() {
        let cache = cache();
        cache
            .put("search:title:dune:5", json!([]), Duration::from_secs(60), "google_books", 0.5)
            .await
            .unwrap();
        cache.invalidate_by_prefix("search:title:").await.unwrap();
        assert!(cache.get("search:title:dune:5").await.unwrap().is_none());
    }
}
