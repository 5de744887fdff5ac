//! The service runtime.
//!
//! 1. **Events** (`events`): typed per-service `create`/`visit` hook bus
//! 2. **Instance** (`instance`): one service's submit/retrieve lifecycle
//! 3. **Registry** (`registry`): owns all instances, drives the expiry sweep
//! 4. **Sweeper** (`sweeper`): background task running the sweep on a timer

pub mod events;
pub mod instance;
pub mod registry;
pub mod sweeper;

// Re-export key types for convenient access.
pub use events::{
    CreateHandler, CreateOutcome, CreateRequest, EventBus, HandlerError, VisitHandler,
    VisitOutcome,
};
pub use instance::{RetrieveError, ServiceInstance, SubmitError, Submitted};
pub use registry::ServiceRegistry;
pub use sweeper::{BackgroundRunnable, BackgroundWorker, SweepRunnable, SweepTask, SweepWorker};

/// Current wall-clock time in millis since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
