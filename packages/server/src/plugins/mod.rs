//! Bundled handler plugins.
//!
//! A handler supplies a service's domain behavior by registering hooks on the
//! service's event bus. Handlers are compiled in and selected per service by
//! the `handler` config key; there is no dynamic module loading.

pub mod clips;
pub mod short_link;

use crate::config::ServiceConfig;
use crate::service::events::EventBus;

/// Why a handler could not be installed. All fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("unknown handler '{name}'")]
    Unknown { name: String },
    #[error("handler '{handler}' requires config key '{key}'")]
    MissingKey {
        handler: &'static str,
        key: &'static str,
    },
    #[error("failed to prepare handler '{handler}': {source}")]
    Setup {
        handler: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Builds the event bus for one service by installing its configured handler.
///
/// # Errors
///
/// Fails for an unknown handler name or when the handler's own setup fails
/// (missing config key, unusable data directory).
pub fn install(config: &ServiceConfig) -> Result<EventBus, PluginError> {
    let mut bus = EventBus::new();
    match config.handler.as_str() {
        clips::NAME => clips::install(config, &mut bus)?,
        short_link::NAME => short_link::install(config, &mut bus)?,
        other => {
            return Err(PluginError::Unknown {
                name: other.to_string(),
            })
        }
    }
    Ok(bus)
}
