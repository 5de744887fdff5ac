//! Background worker for periodic and on-demand sweep tasks.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from an mpsc
//! channel via a `BackgroundRunnable` implementation, with periodic tick
//! callbacks. The expiry sweep wires in as [`SweepRunnable`]: every tick runs
//! a full registry sweep, and [`SweepTask`]s submitted on the channel run a
//! sweep on demand, registry-wide or targeting one service by name. The
//! startup sweep is the caller's job (it runs before the worker starts), so
//! the first interval tick is skipped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::now_millis;
use super::registry::ServiceRegistry;

/// Trait for task handlers executed by [`BackgroundWorker`].
///
/// Implementors define how individual tasks are processed and what happens
/// on each periodic tick.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

/// Task variants for the sweep worker.
#[derive(Debug)]
pub enum SweepTask {
    /// Sweep every registered service.
    RunAll,
    /// Sweep a single service by name.
    RunService { name: String },
}

/// Runs expiry sweeps against the registry.
pub struct SweepRunnable {
    registry: Arc<ServiceRegistry>,
}

impl SweepRunnable {
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl BackgroundRunnable for SweepRunnable {
    type Task = SweepTask;

    async fn run(&mut self, task: SweepTask) {
        match task {
            SweepTask::RunAll => {
                let removed = self.registry.sweep(now_millis()).await;
                debug!(removed, "expiry sweep completed");
            }
            SweepTask::RunService { name } => {
                let Some(instance) = self.registry.get(&name) else {
                    warn!(service = %name, "sweep requested for unknown service");
                    return;
                };
                match instance.sweep(now_millis()).await {
                    Ok(removed) => {
                        debug!(service = %name, removed, "expiry sweep completed");
                    }
                    Err(err) => {
                        error!(service = %name, error = %err, "failed to check for expired content");
                    }
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        self.run(SweepTask::RunAll).await;
    }
}

/// The registry-wide sweep worker.
pub type SweepWorker = BackgroundWorker<SweepRunnable>;

/// Generic background worker that processes tasks via an mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the mpsc channel
/// 2. Calls `BackgroundRunnable::run()` for each task
/// 3. Periodically calls `BackgroundRunnable::on_tick()` at the configured interval
/// 4. Calls `BackgroundRunnable::shutdown()` when stopped
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Starts the background worker with the given runnable and tick interval.
    ///
    /// Returns a `BackgroundWorker` handle that can be used to submit tasks
    /// and stop the worker. The channel capacity is fixed at 256.
    #[must_use]
    pub fn start(mut runnable: R, tick_interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(256);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(
                tick_interval_ms.max(1),
            ));
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submits a task to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped or the channel is full.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// Stops the worker gracefully, waiting for the worker task to complete.
    /// A sweep in progress finishes before the task exits.
    pub async fn stop(&mut self) {
        // Signal shutdown.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Close the task channel.
        self.tx.take();
        // Wait for the worker task to finish.
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::config::ServiceConfig;
    use crate::service::events::EventBus;
    use crate::service::instance::ServiceInstance;

    fn expiring_registry(names: &[&str]) -> (Arc<ServiceRegistry>, TempDir) {
        let dir = tempdir().unwrap();
        let registry = Arc::new(ServiceRegistry::new());

        for name in names {
            let store_location = dir.path().join(format!("{name}.store.json"));
            std::fs::write(
                &store_location,
                br#"{"content":[{"id":"old","creationDate":100}],"users":[]}"#,
            )
            .unwrap();

            let config = ServiceConfig {
                name: (*name).to_string(),
                id_length: 4,
                id_chars: "abcd".to_string(),
                port: 0,
                store_location,
                handler: "clips".to_string(),
                expire_after: Some(500),
                size_limit: None,
                allowed_mimes: None,
                disallowed_mimes: None,
                data_root: dir.path().to_path_buf(),
                extra: serde_json::Map::new(),
            };
            registry.register(Arc::new(ServiceInstance::new(config, EventBus::new()).unwrap()));
        }
        (registry, dir)
    }

    #[tokio::test]
    async fn worker_sweeps_on_the_interval() {
        let (registry, _dir) = expiring_registry(&["svc"]);
        assert_eq!(registry.get("svc").unwrap().content_len().await, 1);

        let mut worker = SweepWorker::start(SweepRunnable::new(registry.clone()), 20);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        worker.stop().await;

        assert_eq!(registry.get("svc").unwrap().content_len().await, 0);
    }

    #[tokio::test]
    async fn stop_before_the_first_tick_leaves_content_alone() {
        let (registry, _dir) = expiring_registry(&["svc"]);

        let mut worker = SweepWorker::start(SweepRunnable::new(registry.clone()), 60_000);
        worker.stop().await;

        assert_eq!(registry.get("svc").unwrap().content_len().await, 1);
    }

    #[tokio::test]
    async fn run_service_task_sweeps_only_the_named_service() {
        let (registry, _dir) = expiring_registry(&["target", "other"]);

        let worker = SweepWorker::start(SweepRunnable::new(registry.clone()), 60_000);
        worker
            .submit(SweepTask::RunService {
                name: "target".to_string(),
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(registry.get("target").unwrap().content_len().await, 0);
        assert_eq!(registry.get("other").unwrap().content_len().await, 1);
    }

    #[tokio::test]
    async fn run_all_task_sweeps_every_service() {
        let (registry, _dir) = expiring_registry(&["a", "b"]);

        let worker = SweepWorker::start(SweepRunnable::new(registry.clone()), 60_000);
        worker.submit(SweepTask::RunAll).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(registry.get("a").unwrap().content_len().await, 0);
        assert_eq!(registry.get("b").unwrap().content_len().await, 0);
    }

    #[tokio::test]
    async fn run_service_task_for_unknown_name_is_ignored() {
        let (registry, _dir) = expiring_registry(&["svc"]);

        let worker = SweepWorker::start(SweepRunnable::new(registry.clone()), 60_000);
        worker
            .submit(SweepTask::RunService {
                name: "missing".to_string(),
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(registry.get("svc").unwrap().content_len().await, 1);
    }

    #[tokio::test]
    async fn submit_after_stop_returns_error() {
        let (registry, _dir) = expiring_registry(&["svc"]);

        let mut worker = SweepWorker::start(SweepRunnable::new(registry), 60_000);
        worker.stop().await;

        let result = worker.submit(SweepTask::RunAll).await;
        assert!(result.is_err());
    }
}
