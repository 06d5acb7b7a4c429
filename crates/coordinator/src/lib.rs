//! # Book Gateway Coordinator
//!
//! The per-job single-writer object. One `tokio::spawn`ed actor owns a
//! job's mutable state and a mailbox; every public operation is a message
//! sent over a cloneable `mpsc::Sender`, so "single writer, addressable by
//! id" holds without a full actor-framework dependency — the same shape
//! the ingestion pipeline's scheduled background tasks already use, just
//! keyed by job id instead of by schedule.

pub mod job_store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use book_gateway_core::envelope::WsEnvelope;
use book_gateway_core::error::{AuthErrorKind, GatewayError};
use book_gateway_core::models::{AuthToken, Job, Photo, PhotoStatus, Pipeline};
use chrono::Utc;
use dashmap::DashMap;
use job_store::JobStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};
use uuid::Uuid;

/// The persisted shape of a job; `book_gateway_core::models::Job` already
/// carries every field a coordinator needs to survive a restart.
pub type JobRecord = Job;

const CLEANUP_AFTER: Duration = Duration::from_secs(24 * 3600);

struct ThrottlePolicy {
    every_n: u32,
    every: Duration,
}

fn throttle_for(pipeline: Pipeline) -> ThrottlePolicy {
    match pipeline {
        Pipeline::BatchEnrichment => ThrottlePolicy {
            every_n: 5,
            every: Duration::from_secs(10),
        },
        Pipeline::CsvImport => ThrottlePolicy {
            every_n: 20,
            every: Duration::from_secs(30),
        },
        Pipeline::AiScan | Pipeline::BatchAiScan => ThrottlePolicy {
            every_n: 1,
            every: Duration::from_secs(60),
        },
    }
}

enum CoordinatorMessage {
    SetAuthToken {
        token: AuthToken,
        respond: oneshot::Sender<()>,
    },
    AttachWebSocket {
        sink: mpsc::UnboundedSender<WsEnvelope>,
        presented_token: Uuid,
        respond: oneshot::Sender<Result<(), GatewayError>>,
    },
    ClientReady {
        respond: oneshot::Sender<()>,
    },
    WaitForReady {
        respond: oneshot::Sender<bool>,
    },
    PushProgress {
        processed: usize,
        payload: serde_json::Value,
        force: bool,
        respond: oneshot::Sender<()>,
    },
    Complete {
        payload: serde_json::Value,
        respond: oneshot::Sender<()>,
    },
    Fail {
        message: String,
        respond: oneshot::Sender<()>,
    },
    Cancel {
        reason: String,
        respond: oneshot::Sender<()>,
    },
    IsCanceled {
        respond: oneshot::Sender<bool>,
    },
    RefreshAuthToken {
        old: Uuid,
        respond: oneshot::Sender<Result<AuthToken, GatewayError>>,
    },
    Snapshot {
        respond: oneshot::Sender<JobRecord>,
    },
    UpdatePhoto {
        index: usize,
        status: PhotoStatus,
        books_found: Option<usize>,
        error: Option<String>,
        respond: oneshot::Sender<()>,
    },
    OnAlarm,
}

/// A cloneable reference to a running job actor.
#[derive(Clone)]
pub struct CoordinatorHandle {
    job_id: Uuid,
    tx: mpsc::Sender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> Result<T, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| GatewayError::NotFound)?;
        rx.await.map_err(|_| GatewayError::NotFound)
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub async fn set_auth_token(&self, token: AuthToken) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::SetAuthToken { token, respond })
            .await
    }

    pub async fn attach_websocket(
        &self,
        sink: mpsc::UnboundedSender<WsEnvelope>,
        presented_token: Uuid,
    ) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::AttachWebSocket {
            sink,
            presented_token,
            respond,
        })
        .await?
    }

    pub async fn client_ready(&self) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::ClientReady { respond })
            .await
    }

    /// Returns once the client has attached and acked `ready`, or `false`
    /// on timeout.
    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(CoordinatorMessage::WaitForReady { respond: tx })
            .await
            .is_err()
        {
            return false;
        }
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(true)))
    }

    pub async fn push_progress(
        &self,
        processed: usize,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::PushProgress {
            processed,
            payload,
            force: false,
            respond,
        })
        .await
    }

    /// Bypasses throttling; used for a pipeline's last update before
    /// `Complete`.
    pub async fn push_final_progress(
        &self,
        processed: usize,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::PushProgress {
            processed,
            payload,
            force: true,
            respond,
        })
        .await
    }

    pub async fn complete(&self, payload: serde_json::Value) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::Complete { payload, respond })
            .await
    }

    pub async fn fail(&self, message: impl Into<String>) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::Fail {
            message: message.into(),
            respond,
        })
        .await
    }

    pub async fn cancel(&self, reason: impl Into<String>) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::Cancel {
            reason: reason.into(),
            respond,
        })
        .await
    }

    pub async fn is_canceled(&self) -> bool {
        self.call(|respond| CoordinatorMessage::IsCanceled { respond })
            .await
            .unwrap_or(true)
    }

    pub async fn refresh_auth_token(&self, old: Uuid) -> Result<AuthToken, GatewayError> {
        self.call(|respond| CoordinatorMessage::RefreshAuthToken { old, respond })
            .await?
    }

    pub async fn snapshot(&self) -> Result<JobRecord, GatewayError> {
        self.call(|respond| CoordinatorMessage::Snapshot { respond })
            .await
    }

    pub async fn update_photo(
        &self,
        index: usize,
        status: PhotoStatus,
        books_found: Option<usize>,
        error: Option<String>,
    ) -> Result<(), GatewayError> {
        self.call(|respond| CoordinatorMessage::UpdatePhoto {
            index,
            status,
            books_found,
            error,
            respond,
        })
        .await
    }
}

struct ActorState {
    record: JobRecord,
    sink: Option<mpsc::UnboundedSender<WsEnvelope>>,
    ready_acked: bool,
    ready_waiters: Vec<oneshot::Sender<bool>>,
    updates_since_broadcast: u32,
    last_broadcast_at: Instant,
    refresh_in_progress: bool,
}

struct CoordinatorActor {
    state: ActorState,
    store: Arc<dyn JobStore>,
    self_tx: mpsc::Sender<CoordinatorMessage>,
}

impl CoordinatorActor {
    fn broadcast(&mut self, envelope: WsEnvelope) {
        if let Some(sink) = &self.state.sink {
            if sink.send(envelope).is_err() {
                self.state.sink = None;
            }
        }
    }

    async fn persist(&mut self, terminal: bool) {
        self.state.record.updated_at = Utc::now();
        if terminal {
            let mut attempt = 0u32;
            loop {
                match self.store.save(&self.state.record).await {
                    Ok(()) => break,
                    Err(err) => {
                        attempt += 1;
                        error!(job_id = %self.state.record.id, attempt, error = %err, "terminal persist failed, retrying");
                        tokio::time::sleep(Duration::from_millis(100 * attempt.min(10) as u64)).await;
                    }
                }
            }
        } else if let Err(first_err) = self.store.save(&self.state.record).await {
            warn!(job_id = %self.state.record.id, error = %first_err, "persist failed, retrying once");
            if let Err(second_err) = self.store.save(&self.state.record).await {
                warn!(job_id = %self.state.record.id, error = %second_err, "persist failed twice, dropping (advisory update)");
            }
        }
    }

    fn bump_version(&mut self) -> u64 {
        self.state.record.version += 1;
        self.state.record.version
    }

    fn schedule_cleanup(&self) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CLEANUP_AFTER).await;
            let _ = tx.send(CoordinatorMessage::OnAlarm).await;
        });
    }

    async fn handle(&mut self, message: CoordinatorMessage) -> bool {
        match message {
            CoordinatorMessage::SetAuthToken { token, respond } => {
                self.state.record.token = Some(token);
                self.state.record.updated_at = Utc::now();
                self.persist(false).await;
                let _ = respond.send(());
            }
            CoordinatorMessage::AttachWebSocket {
                sink,
                presented_token,
                respond,
            } => {
                let result = self.attach(sink, presented_token);
                if result.is_ok() {
                    self.persist(false).await;
                }
                let _ = respond.send(result);
            }
            CoordinatorMessage::ClientReady { respond } => {
                self.state.ready_acked = true;
                let job_id = self.state.record.id;
                let pipeline = self.state.record.pipeline;
                let version = self.bump_version();
                self.broadcast(WsEnvelope::ReadyAck {
                    job_id,
                    pipeline,
                    version,
                    timestamp: Utc::now(),
                    payload: serde_json::json!({}),
                });
                for waiter in self.state.ready_waiters.drain(..) {
                    let _ = waiter.send(true);
                }
                let _ = respond.send(());
            }
            CoordinatorMessage::WaitForReady { respond } => {
                if self.state.ready_acked {
                    let _ = respond.send(true);
                } else {
                    self.state.ready_waiters.push(respond);
                }
            }
            CoordinatorMessage::PushProgress {
                processed,
                payload,
                force,
                respond,
            } => {
                self.push_progress(processed, payload, force).await;
                let _ = respond.send(());
            }
            CoordinatorMessage::Complete { payload, respond } => {
                if !self.state.record.status.is_terminal() {
                    self.terminate(book_gateway_core::models::JobStatus::Complete, payload)
                        .await;
                }
                let _ = respond.send(());
            }
            CoordinatorMessage::Fail { message, respond } => {
                if !self.state.record.status.is_terminal() {
                    self.terminate(
                        book_gateway_core::models::JobStatus::Failed,
                        serde_json::json!({ "message": message }),
                    )
                    .await;
                }
                let _ = respond.send(());
            }
            CoordinatorMessage::Cancel { reason, respond } => {
                if !self.state.record.status.is_terminal() {
                    self.state.record.cancel_requested = true;
                    self.terminate(
                        book_gateway_core::models::JobStatus::Canceled,
                        serde_json::json!({ "reason": reason }),
                    )
                    .await;
                }
                let _ = respond.send(());
            }
            CoordinatorMessage::IsCanceled { respond } => {
                let _ = respond.send(self.state.record.cancel_requested);
            }
            CoordinatorMessage::RefreshAuthToken { old, respond } => {
                let result = self.refresh_token(old);
                if result.is_ok() {
                    self.persist(false).await;
                }
                let _ = respond.send(result);
            }
            CoordinatorMessage::Snapshot { respond } => {
                let _ = respond.send(self.state.record.clone());
            }
            CoordinatorMessage::UpdatePhoto {
                index,
                status,
                books_found,
                error,
                respond,
            } => {
                self.update_photo(index, status, books_found, error);
                self.bump_version();
                self.persist(false).await;
                let _ = respond.send(());
            }
            CoordinatorMessage::OnAlarm => {
                let _ = self.store.delete(self.state.record.id).await;
                return true;
            }
        }
        false
    }

    fn attach(
        &mut self,
        sink: mpsc::UnboundedSender<WsEnvelope>,
        presented_token: Uuid,
    ) -> Result<(), GatewayError> {
        let record = &mut self.state.record;
        let token = record.token.as_ref().ok_or(GatewayError::Auth(AuthErrorKind::Missing))?;
        if !token.is_valid(Utc::now(), presented_token) {
            return Err(GatewayError::Auth(AuthErrorKind::InvalidToken));
        }
        self.state.sink = Some(sink);
        if record.status == book_gateway_core::models::JobStatus::Initializing {
            record.status = book_gateway_core::models::JobStatus::Ready;
        }
        Ok(())
    }

    fn refresh_token(&mut self, old: Uuid) -> Result<AuthToken, GatewayError> {
        if self.state.refresh_in_progress {
            return Err(GatewayError::Auth(AuthErrorKind::RefreshInProgress));
        }
        let current = self
            .state
            .record
            .token
            .clone()
            .ok_or(GatewayError::Auth(AuthErrorKind::Missing))?;
        if current.token != old {
            return Err(GatewayError::Auth(AuthErrorKind::InvalidToken));
        }
        let now = Utc::now();
        if now >= current.expires_at {
            return Err(GatewayError::Auth(AuthErrorKind::Expired));
        }
        if !current.in_refresh_window(now) {
            return Err(GatewayError::Auth(AuthErrorKind::RefreshTooEarly));
        }
        self.state.refresh_in_progress = true;
        let new_token = AuthToken::new(now);
        self.state.record.token = Some(new_token.clone());
        self.state.refresh_in_progress = false;
        Ok(new_token)
    }

    async fn push_progress(&mut self, processed: usize, payload: serde_json::Value, force: bool) {
        self.state.record.processed = processed;
        if self.state.record.status == book_gateway_core::models::JobStatus::Ready {
            self.state.record.status = book_gateway_core::models::JobStatus::Processing;
        }
        let version = self.bump_version();
        self.state.updates_since_broadcast += 1;

        let policy = throttle_for(self.state.record.pipeline);
        let due = force
            || self.state.updates_since_broadcast >= policy.every_n
            || self.state.last_broadcast_at.elapsed() >= policy.every;

        self.persist(false).await;

        if due {
            self.state.updates_since_broadcast = 0;
            self.state.last_broadcast_at = Instant::now();
            let job_id = self.state.record.id;
            let pipeline = self.state.record.pipeline;
            self.broadcast(WsEnvelope::Progress {
                job_id,
                pipeline,
                version,
                timestamp: Utc::now(),
                payload,
            });
        }
    }

    async fn terminate(&mut self, status: book_gateway_core::models::JobStatus, payload: serde_json::Value) {
        self.state.record.status = status;
        self.state.record.result = Some(payload.clone());
        let version = self.bump_version();
        let job_id = self.state.record.id;
        let pipeline = self.state.record.pipeline;
        let envelope = match status {
            book_gateway_core::models::JobStatus::Complete => WsEnvelope::Complete {
                job_id,
                pipeline,
                version,
                timestamp: Utc::now(),
                payload,
            },
            book_gateway_core::models::JobStatus::Failed => WsEnvelope::Failed {
                job_id,
                pipeline,
                version,
                timestamp: Utc::now(),
                payload,
            },
            _ => WsEnvelope::Canceled {
                job_id,
                pipeline,
                version,
                timestamp: Utc::now(),
                payload,
            },
        };
        self.broadcast(envelope);
        self.persist(true).await;
        self.schedule_cleanup();
    }

    fn update_photo(
        &mut self,
        index: usize,
        status: PhotoStatus,
        books_found: Option<usize>,
        error: Option<String>,
    ) {
        let photos = self.state.record.photos.get_or_insert_with(Vec::new);
        if let Some(photo) = photos.iter_mut().find(|p| p.index == index) {
            photo.status = status;
            if let Some(found) = books_found {
                photo.books_found = found;
            }
            if error.is_some() {
                photo.error_message = error;
            }
        } else {
            photos.push(Photo {
                index,
                status,
                books_found: books_found.unwrap_or(0),
                error_message: error,
            });
        }
    }
}

/// Spawns a fresh actor for `job_id` and registers its handle.
pub struct CoordinatorRegistry {
    handles: DashMap<Uuid, CoordinatorHandle>,
    store: Arc<dyn JobStore>,
}

impl CoordinatorRegistry {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            handles: DashMap::new(),
            store,
        }
    }

    pub fn init(&self, pipeline: Pipeline, total: usize) -> CoordinatorHandle {
        let job_id = Uuid::new_v4();
        let record = Job::new(job_id, pipeline, total);
        let (tx, rx) = mpsc::channel(64);
        let handle = CoordinatorHandle {
            job_id,
            tx: tx.clone(),
        };

        let actor = CoordinatorActor {
            state: ActorState {
                record,
                sink: None,
                ready_acked: false,
                ready_waiters: Vec::new(),
                updates_since_broadcast: 0,
                last_broadcast_at: Instant::now(),
                refresh_in_progress: false,
            },
            store: self.store.clone(),
            self_tx: tx,
        };

        tokio::spawn(run_actor(actor, rx));
        self.handles.insert(job_id, handle.clone());
        handle
    }

    pub fn get(&self, job_id: Uuid) -> Option<CoordinatorHandle> {
        self.handles.get(&job_id).map(|h| h.clone())
    }

    /// Drops a stale handle once its actor has exited (post-cleanup-alarm).
    pub fn forget(&self, job_id: Uuid) {
        self.handles.remove(&job_id);
    }

    pub async fn snapshot_or_reload(&self, job_id: Uuid) -> Result<JobRecord, GatewayError> {
        if let Some(handle) = self.get(job_id) {
            if let Ok(record) = handle.snapshot().await {
                return Ok(record);
            }
            self.forget(job_id);
        }
        self.store
            .load(job_id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or(GatewayError::NotFound)
    }
}

async fn run_actor(mut actor: CoordinatorActor, mut rx: mpsc::Receiver<CoordinatorMessage>) {
    while let Some(message) = rx.recv().await {
        if actor.handle(message).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_store::InMemoryJobStore;

    fn registry() -> CoordinatorRegistry {
        CoordinatorRegistry::new(Arc::new(InMemoryJobStore::new()))
    }

    #[tokio::test]
    async fn init_starts_in_initializing_state() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 5);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, book_gateway_core::models::JobStatus::Initializing);
        assert_eq!(snapshot.version, 0);
    }

    #[tokio::test]
    async fn attach_then_ready_transitions_and_unblocks_wait_for_ready() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 5);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await.unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        handle.attach_websocket(tx, token.token).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, book_gateway_core::models::JobStatus::Ready);

        let wait_handle = handle.clone();
        let waiter = tokio::spawn(async move { wait_handle.wait_for_ready(Duration::from_secs(1)).await });
        handle.client_ready().await.unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn attach_rejects_wrong_token() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 5);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token).await.unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = handle.attach_websocket(tx, Uuid::new_v4()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_is_terminal_and_cancel_after_is_noop() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 2);
        handle.complete(serde_json::json!({"ok": true})).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, book_gateway_core::models::JobStatus::Complete);

        handle.cancel("too late").await.unwrap();
        let snapshot_after = handle.snapshot().await.unwrap();
        assert_eq!(snapshot_after.status, book_gateway_core::models::JobStatus::Complete);
    }

    #[tokio::test]
    async fn canceled_is_terminal_and_complete_after_is_noop() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 2);
        handle.cancel("client disconnected").await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, book_gateway_core::models::JobStatus::Canceled);

        handle.complete(serde_json::json!({"ok": true})).await.unwrap();
        let snapshot_after = handle.snapshot().await.unwrap();
        assert_eq!(snapshot_after.status, book_gateway_core::models::JobStatus::Canceled);
    }

    #[tokio::test]
    async fn failed_is_terminal_and_second_fail_is_noop() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 2);
        handle.fail("first failure").await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, book_gateway_core::models::JobStatus::Failed);

        handle.complete(serde_json::json!({"ok": true})).await.unwrap();
        let snapshot_after = handle.snapshot().await.unwrap();
        assert_eq!(snapshot_after.status, book_gateway_core::models::JobStatus::Failed);
    }

    #[tokio::test]
    async fn refresh_token_rejects_early_refresh() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 1);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await.unwrap();

        let result = handle.refresh_auth_token(token.token).await;
        assert!(matches!(result, Err(GatewayError::Auth(AuthErrorKind::RefreshTooEarly))));
    }

    #[tokio::test]
    async fn update_photo_creates_then_updates_entry() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchAiScan, 3);
        handle
            .update_photo(0, PhotoStatus::Processing, None, None)
            .await
            .unwrap();
        handle
            .update_photo(0, PhotoStatus::Complete, Some(4), None)
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        let photo = &snapshot.photos.unwrap()[0];
        assert_eq!(photo.status, PhotoStatus::Complete);
        assert_eq!(photo.books_found, 4);
    }

    #[tokio::test]
    async fn version_increases_monotonically_across_operations() {
        let registry = registry();
        let handle = registry.init(Pipeline::BatchEnrichment, 3);
        handle.push_progress(1, serde_json::json!({})).await.unwrap();
        handle.push_progress(2, serde_json::json!({})).await.unwrap();
        let before_complete = handle.snapshot().await.unwrap().version;
        handle.complete(serde_json::json!({})).await.unwrap();
        let after_complete = handle.snapshot().await.unwrap().version;
        assert!(after_complete > before_complete);
    }
}
