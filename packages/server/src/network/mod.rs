//! HTTP transport: per-service server configuration, middleware, and handlers.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::ServiceModule;
