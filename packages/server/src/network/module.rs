//! Per-service HTTP server with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation lets the application finish wiring shared
//! state (registry, sweeper) between `start()` and `serve()`, and lets
//! tests bind port 0 and read back the assigned port.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::service::ServiceInstance;

use super::config::NetworkConfig;
use super::handlers::{fallback_handler, retrieve_handler, submit_handler, AppState};
use super::middleware::build_http_layers;

/// Manages one service's HTTP server lifecycle.
///
/// Each configured service gets its own module bound to its own port;
/// the router's state carries exactly that service's instance.
pub struct ServiceModule {
    config: NetworkConfig,
    instance: Arc<ServiceInstance>,
    listener: Option<TcpListener>,
}

impl ServiceModule {
    /// Creates a new module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, instance: Arc<ServiceInstance>) -> Self {
        Self {
            config,
            instance,
            listener: None,
        }
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /` -- submit new content
    /// - `GET /{id}` -- retrieve content by id (trailing slash tolerated)
    /// - anything else -- bare `404`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            instance: Arc::clone(&self.instance),
        };

        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/", post(submit_handler))
            .route("/{id}", get(retrieve_handler))
            .route("/{id}/", get(retrieve_handler))
            .fallback(fallback_handler)
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(
            service = %self.instance.name(),
            "TCP listener bound to {}:{}", self.config.host, port
        );

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving connections until the shutdown signal fires.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .expect("start() must be called before serve()");
        let router = self.build_router();

        info!(service = %self.instance.name(), "serving HTTP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!(service = %self.instance.name(), "server stopped");
        Ok(())
    }
}
