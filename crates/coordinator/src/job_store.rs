//! Persistence for `JobRecord`, behind a trait so the coordinator actor
//! doesn't know whether it's talking to Redis or an in-memory stand-in.
//! Mirrors the split used for the cache tier's `DurableStore`: one real
//! implementation, one in-memory implementation for tests.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use thiserror::Error;
use uuid::Uuid;

use crate::JobRecord;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),
    #[error("job record corrupt: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, JobStoreError>;
    async fn save(&self, record: &JobRecord) -> Result<(), JobStoreError>;
    async fn delete(&self, job_id: Uuid) -> Result<(), JobStoreError>;
}

pub struct RedisJobStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisJobStore {
    pub async fn connect(redis_url: &str) -> Result<Self, JobStoreError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn key(job_id: Uuid) -> String {
        format!("job:{job_id}")
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, JobStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn
            .get(Self::key(job_id))
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        match raw {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| JobStoreError::Corrupt(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        let bytes =
            serde_json::to_vec(record).map_err(|e| JobStoreError::Corrupt(e.to_string()))?;
        // Persisted state outlives the 24h cleanup alarm by a margin so a
        // crashed scheduler doesn't strand state indefinitely.
        let ttl_secs = 26 * 3600;
        conn.set_ex::<_, _, ()>(Self::key(record.id), bytes, ttl_secs)
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(job_id))
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryJobStore {
    records: DashMap<Uuid, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, JobStoreError> {
        Ok(self.records.get(&job_id).map(|r| r.clone()))
    }

    async fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), JobStoreError> {
        self.records.remove(&job_id);
        Ok(())
    }
}
