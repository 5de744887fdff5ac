//! Per-service event bus with a closed lifecycle event set.
//!
//! The two lifecycle events, `create` and `visit`, are separate typed hook
//! lists (one handler trait per event) rather than string-keyed callback
//! tables, so a handler registered against a misspelled event name is
//! unrepresentable. Emission is sequential and awaited: hooks that mutate the
//! record (attaching a file path, a target URL) complete before later hooks
//! or the persistence step observe it.
//!
//! Hooks return plain outcome values which the transport layer sends; they
//! never write a response themselves.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use hostbox_core::ContentRecord;

/// Failure raised by a `create` or `visit` hook.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The submission itself is at fault (bad body, wrong URL scheme).
    /// Surfaces as the given 4xx status instead of a 500.
    #[error("{error}")]
    Rejected { status: u16, error: String },
    #[error("handler i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Payload and request metadata handed to `create` hooks.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub payload: Bytes,
    pub content_type: String,
}

/// Value a `create` hook produces for the transport to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Record accepted; `kind` is the handler's human-readable content name
    /// ("clip", "short link") used in the success message.
    Created { kind: String },
}

/// Value a `visit` hook produces for the transport to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Stream the file at `path` back with `Content-Type: mime`.
    File { path: PathBuf, mime: String },
    /// Redirect (302) to `url`.
    Redirect { url: String },
}

pub type CreateHookResult = Result<Option<CreateOutcome>, HandlerError>;
pub type VisitHookResult = Result<Option<VisitOutcome>, HandlerError>;

/// Hook invoked when a validated submission is ready to become a record.
///
/// Implementations validate the payload, attach their metadata to `record`,
/// and perform any domain-side persistence (e.g. writing the blob to disk).
#[async_trait]
pub trait CreateHandler: Send + Sync {
    async fn on_create(
        &self,
        record: &mut ContentRecord,
        request: &CreateRequest,
    ) -> CreateHookResult;
}

/// Hook invoked when a stored record is retrieved.
#[async_trait]
pub trait VisitHandler: Send + Sync {
    async fn on_visit(&self, record: &ContentRecord) -> VisitHookResult;
}

struct Hook<H: ?Sized> {
    handler: Box<H>,
    once: bool,
}

/// Ordered, awaitable publish/subscribe scoped to one service instance.
#[derive(Default)]
pub struct EventBus {
    create: Vec<Hook<dyn CreateHandler>>,
    visit: Vec<Hook<dyn VisitHandler>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `create` hook, invoked on every emission.
    pub fn on_create(&mut self, handler: impl CreateHandler + 'static) {
        self.create.push(Hook {
            handler: Box::new(handler),
            once: false,
        });
    }

    /// Registers a `create` hook removed after its first completed invocation.
    pub fn once_create(&mut self, handler: impl CreateHandler + 'static) {
        self.create.push(Hook {
            handler: Box::new(handler),
            once: true,
        });
    }

    /// Registers a `visit` hook, invoked on every emission.
    pub fn on_visit(&mut self, handler: impl VisitHandler + 'static) {
        self.visit.push(Hook {
            handler: Box::new(handler),
            once: false,
        });
    }

    /// Registers a `visit` hook removed after its first completed invocation.
    pub fn once_visit(&mut self, handler: impl VisitHandler + 'static) {
        self.visit.push(Hook {
            handler: Box::new(handler),
            once: true,
        });
    }

    /// Invokes every `create` hook in registration order, awaiting each to
    /// completion before the next runs. Resolves immediately when no hook is
    /// registered.
    ///
    /// The last hook to produce an outcome wins. A `once` entry is removed
    /// only after its own invocation completes, so the entry registered right
    /// after it is neither skipped nor double-invoked in the same pass.
    ///
    /// # Errors
    ///
    /// The first hook error aborts the emission; later hooks do not run and
    /// a failed `once` hook stays registered.
    pub async fn emit_create(
        &mut self,
        record: &mut ContentRecord,
        request: &CreateRequest,
    ) -> CreateHookResult {
        let mut outcome = None;
        let mut index = 0;
        while index < self.create.len() {
            let produced = self.create[index].handler.on_create(record, request).await?;
            if produced.is_some() {
                outcome = produced;
            }
            if self.create[index].once {
                self.create.remove(index);
            } else {
                index += 1;
            }
        }
        Ok(outcome)
    }

    /// Invokes every `visit` hook in registration order; same ordering,
    /// `once`, and error semantics as [`EventBus::emit_create`].
    ///
    /// # Errors
    ///
    /// The first hook error aborts the emission.
    pub async fn emit_visit(&mut self, record: &ContentRecord) -> VisitHookResult {
        let mut outcome = None;
        let mut index = 0;
        while index < self.visit.len() {
            let produced = self.visit[index].handler.on_visit(record).await?;
            if produced.is_some() {
                outcome = produced;
            }
            if self.visit[index].once {
                self.visit.remove(index);
            } else {
                index += 1;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn request() -> CreateRequest {
        CreateRequest {
            payload: Bytes::from_static(b"payload"),
            content_type: "application/octet-stream".to_string(),
        }
    }

    fn record() -> ContentRecord {
        ContentRecord::new("id1".to_string(), 1)
    }

    /// Create hook that logs a label, optionally sleeping first to expose
    /// ordering races, and optionally producing an outcome.
    struct LoggingCreate {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        sleep_ms: u64,
        produce: Option<&'static str>,
    }

    #[async_trait]
    impl CreateHandler for LoggingCreate {
        async fn on_create(
            &self,
            _record: &mut ContentRecord,
            _request: &CreateRequest,
        ) -> CreateHookResult {
            if self.sleep_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.sleep_ms)).await;
            }
            self.log.lock().push(self.label);
            Ok(self.produce.map(|kind| CreateOutcome::Created {
                kind: kind.to_string(),
            }))
        }
    }

    fn logging(
        label: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        sleep_ms: u64,
        produce: Option<&'static str>,
    ) -> LoggingCreate {
        LoggingCreate {
            label,
            log: log.clone(),
            sleep_ms,
            produce,
        }
    }

    #[tokio::test]
    async fn hooks_run_sequentially_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        // The first hook suspends before logging: a concurrently-run second
        // hook would win the race, a sequentially-awaited one cannot.
        bus.on_create(logging("first", &log, 20, None));
        bus.on_create(logging("second", &log, 0, None));

        bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    struct AttachMime;

    #[async_trait]
    impl CreateHandler for AttachMime {
        async fn on_create(
            &self,
            record: &mut ContentRecord,
            request: &CreateRequest,
        ) -> CreateHookResult {
            record.set_extra("mimeType", request.content_type.clone());
            Ok(None)
        }
    }

    struct ObserveMime {
        seen: Arc<Mutex<Option<String>>>,
    }

    #[async_trait]
    impl CreateHandler for ObserveMime {
        async fn on_create(
            &self,
            record: &mut ContentRecord,
            _request: &CreateRequest,
        ) -> CreateHookResult {
            *self.seen.lock() = record.extra_str("mimeType").map(ToString::to_string);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn later_hooks_observe_earlier_mutations() {
        let seen = Arc::new(Mutex::new(None));
        let mut bus = EventBus::new();
        bus.on_create(AttachMime);
        bus.on_create(ObserveMime { seen: seen.clone() });

        bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(seen.lock().as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn once_hook_removed_without_skipping_successor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.once_create(logging("once", &log, 0, None));
        bus.on_create(logging("always", &log, 0, None));

        bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(*log.lock(), vec!["once", "always"]);

        bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(*log.lock(), vec!["once", "always", "always"]);
    }

    #[tokio::test]
    async fn last_produced_outcome_wins_and_none_does_not_clear_it() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on_create(logging("a", &log, 0, Some("first")));
        bus.on_create(logging("b", &log, 0, None));

        let result = bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(
            result,
            Some(CreateOutcome::Created {
                kind: "first".to_string()
            })
        );

        bus.on_create(logging("c", &log, 0, Some("second")));
        let result = bus.emit_create(&mut record(), &request()).await.unwrap();
        assert_eq!(
            result,
            Some(CreateOutcome::Created {
                kind: "second".to_string()
            })
        );
    }

    #[tokio::test]
    async fn emit_without_hooks_resolves_immediately() {
        let mut bus = EventBus::new();
        assert!(bus
            .emit_create(&mut record(), &request())
            .await
            .unwrap()
            .is_none());
        assert!(bus.emit_visit(&record()).await.unwrap().is_none());
    }

    struct FailingCreate;

    #[async_trait]
    impl CreateHandler for FailingCreate {
        async fn on_create(
            &self,
            _record: &mut ContentRecord,
            _request: &CreateRequest,
        ) -> CreateHookResult {
            Err(HandlerError::Rejected {
                status: 400,
                error: "URL not provided!".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn hook_error_aborts_emission_and_skips_later_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on_create(FailingCreate);
        bus.on_create(logging("after", &log, 0, None));

        let err = bus
            .emit_create(&mut record(), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Rejected { status: 400, .. }));
        assert!(log.lock().is_empty());
    }

    struct CountingVisit {
        count: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl VisitHandler for CountingVisit {
        async fn on_visit(&self, _record: &ContentRecord) -> VisitHookResult {
            *self.count.lock() += 1;
            Ok(Some(VisitOutcome::Redirect {
                url: "https://example.com".to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn once_visit_hook_fires_exactly_once() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        bus.once_visit(CountingVisit {
            count: count.clone(),
        });

        let first = bus.emit_visit(&record()).await.unwrap();
        assert!(matches!(first, Some(VisitOutcome::Redirect { .. })));
        let second = bus.emit_visit(&record()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(*count.lock(), 1);
    }
}
