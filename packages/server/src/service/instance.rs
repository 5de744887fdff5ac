//! One independently configured content endpoint.
//!
//! A `ServiceInstance` binds one content store, one event bus, and one merged
//! configuration. It is the unit of isolation: its own store file, its own
//! port, no cross-instance state. Store and bus sit behind a single async
//! mutex, making every mutation of one service's state single-writer — two
//! concurrent submissions can no longer interleave their full-file rewrites.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use hostbox_core::{ApiReply, ContentRecord, MimePolicy};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::events::{CreateOutcome, CreateRequest, EventBus, HandlerError, VisitOutcome};
use super::now_millis;
use crate::config::ServiceConfig;
use crate::storage::{ContentStore, StoreError, StoreField};

/// Why a submission was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Content-Type header is missing")]
    MissingContentType,
    #[error("Content-Type is not allowed")]
    ContentTypeNotAllowed,
    #[error("Content-Length header is missing")]
    MissingContentLength,
    #[error("payload exceeds the configured size limit")]
    PayloadTooLarge,
    #[error("failed reading request body: {0}")]
    Body(String),
    #[error(transparent)]
    Handler(HandlerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmitError {
    /// Maps the failure to the wire envelope the transport sends.
    #[must_use]
    pub fn to_reply(&self) -> ApiReply {
        match self {
            Self::MissingContentType => ApiReply::missing_type(),
            Self::MissingContentLength => ApiReply::missing_length(),
            Self::ContentTypeNotAllowed => ApiReply::content_type_not_allowed(),
            Self::PayloadTooLarge => ApiReply::data_too_large(),
            // The transport detail is logged, not echoed to the client.
            Self::Body(_) => ApiReply::error(400, 0, "Failed to read request body!"),
            Self::Handler(HandlerError::Rejected { status, error }) => {
                ApiReply::error(*status, 0, error.clone())
            }
            Self::Handler(_) | Self::Store(_) => ApiReply::server_error(),
        }
    }
}

/// Why a retrieval failed.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("the ID '{id}' was not found")]
    NotFound { id: String },
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl RetrieveError {
    /// Maps the failure to the wire envelope the transport sends.
    #[must_use]
    pub fn to_reply(&self) -> ApiReply {
        match self {
            Self::NotFound { id } => ApiReply::id_not_found(id),
            Self::Handler(HandlerError::Rejected { status, error }) => {
                ApiReply::error(*status, 0, error.clone())
            }
            Self::Handler(_) => ApiReply::server_error(),
        }
    }
}

/// Result of a completed submission.
#[derive(Debug)]
pub struct Submitted {
    pub id: String,
    /// Outcome produced by the `create` hooks, `None` when no hook produced
    /// one (the transport then sends a generic success envelope).
    pub outcome: Option<CreateOutcome>,
}

/// Store + bus pair guarded by one lock: the single-writer discipline for
/// this service's state.
struct ServiceState {
    store: ContentStore,
    bus: EventBus,
}

/// One service's end-to-end submit/retrieve lifecycle.
pub struct ServiceInstance {
    config: ServiceConfig,
    mime_policy: MimePolicy,
    state: Mutex<ServiceState>,
}

impl ServiceInstance {
    /// Loads the service's store and binds the event bus with its registered
    /// hooks. Hook registration happens before construction, so a running
    /// instance's hook set is fixed apart from `once` removal.
    ///
    /// # Errors
    ///
    /// Fails on store I/O faults or invalid MIME patterns (the latter should
    /// already have been caught by config validation).
    pub fn new(config: ServiceConfig, bus: EventBus) -> anyhow::Result<Self> {
        let mime_policy = config.mime_policy()?;
        let store = ContentStore::load(config.store_location.clone())?;
        Ok(Self {
            config,
            mime_policy,
            state: Mutex::new(ServiceState { store, bus }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Accepts one submission end to end: header validation, size-limited
    /// body collection, id allocation, `create` emission, persistence.
    ///
    /// The body is drained before the service lock is taken, with the byte
    /// count checked incrementally as chunks arrive — an oversized payload
    /// aborts mid-stream instead of buffering unbounded data.
    ///
    /// # Errors
    ///
    /// Client faults map to 4xx envelopes via [`SubmitError::to_reply`]; hook
    /// and storage faults map to 500. A hook failure leaves nothing
    /// persisted.
    pub async fn submit<S, E>(
        &self,
        content_type: Option<&str>,
        content_length: Option<u64>,
        body: S,
    ) -> Result<Submitted, SubmitError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let content_type = content_type.ok_or(SubmitError::MissingContentType)?;
        if !self.mime_policy.permits(content_type) {
            return Err(SubmitError::ContentTypeNotAllowed);
        }
        let declared = content_length.ok_or(SubmitError::MissingContentLength)?;
        if let Some(limit) = self.config.size_limit {
            if declared > limit {
                return Err(SubmitError::PayloadTooLarge);
            }
        }

        let payload = self.collect_body(body).await?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let id = state
            .store
            .allocate_id(self.config.id_length, &self.config.id_chars)?;
        let mut record = ContentRecord::new(id.clone(), now_millis());
        let request = CreateRequest {
            payload,
            content_type: content_type.to_string(),
        };

        match state.bus.emit_create(&mut record, &request).await {
            Ok(outcome) => {
                state.store.save(StoreField::Content(vec![record]))?;
                info!(service = %self.config.name, id = %id, "created content");
                Ok(Submitted { id, outcome })
            }
            Err(err) => {
                warn!(service = %self.config.name, id = %id, error = %err, "failed creating content");
                Err(SubmitError::Handler(err))
            }
        }
    }

    /// Looks up a record and emits `visit`; the hooks decide how the
    /// transport answers (stream, redirect).
    ///
    /// # Errors
    ///
    /// `NotFound` for an id never stored; hook failures surface as server
    /// errors.
    pub async fn retrieve(&self, id: &str) -> Result<Option<VisitOutcome>, RetrieveError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(record) = state.store.find(id) else {
            return Err(RetrieveError::NotFound { id: id.to_string() });
        };

        match state.bus.emit_visit(record).await {
            Ok(outcome) => {
                info!(service = %self.config.name, id = %id, "visited content");
                Ok(outcome)
            }
            Err(err) => {
                warn!(service = %self.config.name, id = %id, error = %err, "failed to visit content");
                Err(err.into())
            }
        }
    }

    /// Expires and compacts content older than `expireAfter`, persisting when
    /// anything was removed. A no-op for services without a TTL; a TTL of 0
    /// also means "never expire", not "expire immediately".
    ///
    /// # Errors
    ///
    /// Only the post-compaction persist can fail.
    pub async fn sweep(&self, now: i64) -> Result<usize, StoreError> {
        let Some(expire_after) = self.config.expire_after.filter(|&ttl| ttl > 0) else {
            return Ok(0);
        };

        let mut guard = self.state.lock().await;
        let removed = guard.store.expire(now, expire_after);
        if removed.is_empty() {
            return Ok(0);
        }
        for id in &removed {
            info!(service = %self.config.name, id = %id, "removing expired content");
        }
        guard.store.persist()?;
        Ok(removed.len())
    }

    /// A point-in-time copy of a stored record, mainly for tests and
    /// diagnostics.
    pub async fn record(&self, id: &str) -> Option<ContentRecord> {
        self.state.lock().await.store.find(id).cloned()
    }

    /// Number of live records.
    pub async fn content_len(&self) -> usize {
        self.state.lock().await.store.content().len()
    }

    async fn collect_body<S, E>(&self, mut body: S) -> Result<Bytes, SubmitError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut collected = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| {
                warn!(service = %self.config.name, error = %err, "failed reading request body");
                SubmitError::Body(err.to_string())
            })?;
            collected.extend_from_slice(&chunk);
            if let Some(limit) = self.config.size_limit {
                if collected.len() as u64 > limit {
                    return Err(SubmitError::PayloadTooLarge);
                }
            }
        }
        Ok(collected.freeze())
    }
}
