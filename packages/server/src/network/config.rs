//! Network configuration for one service's listener.

use std::time::Duration;

use crate::config::ServiceConfig;

/// Transport settings for a single service instance's HTTP server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// Transport defaults bound to the service's configured port.
    #[must_use]
    pub fn for_service(config: &ServiceConfig) -> Self {
        Self {
            port: config.port,
            ..Self::default()
        }
    }
}
