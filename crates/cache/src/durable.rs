//! The durable tier backing `UnifiedCache`. Production uses Redis; tests use
//! an in-memory stand-in behind the same trait, so the cache's cross-tier
//! logic never has to know which one it's talking to.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::CacheError;

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn put_raw(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}

pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))
    }

    async fn put_raw(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, bytes, secs)
            .await
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))?
            .collect()
            .await;
        if keys.is_empty() {
            return Ok(());
        }
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| CacheError::DurableUnavailable(e.to_string()))
    }
}

/// Test-only in-memory durable tier, used wherever a real Redis instance
/// isn't available.
#[derive(Default)]
pub struct InMemoryDurableStore {
    entries: DashMap<String, (Vec<u8>, Instant, Duration)>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self.entries.get(key) {
            Some(entry) => {
                let (bytes, stored_at, ttl) = entry.value().clone();
                if stored_at.elapsed() > ttl {
                    drop(entry);
                    self.entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(bytes))
                }
            }
            None => Ok(None),
        }
    }

    async fn put_raw(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), (bytes, Instant::now(), ttl));
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let to_remove: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect();
        for key in to_remove {
            self.entries.remove(&key);
        }
        Ok(())
    }
}

/// Wraps any `DurableStore` so a transient failure degrades to a miss with a
/// warning rather than propagating, matching `UnifiedCache::get`'s
/// availability-over-correctness posture for the read path.
pub async fn get_or_warn(store: &Arc<dyn DurableStore>, key: &str) -> Option<Vec<u8>> {
    match store.get_raw(key).await {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %err, "durable cache tier unavailable on read");
            None
        }
    }
}
