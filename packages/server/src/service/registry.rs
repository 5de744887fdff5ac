//! Registry of running service instances.
//!
//! Provides name-based lookup plus a registration-order list so sweeps run in
//! a deterministic sequence. The registry drives the cross-service expiry
//! sweep; a failure sweeping one service is logged and never prevents the
//! remaining services from being swept.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::error;

use super::instance::ServiceInstance;

/// Owns all running [`ServiceInstance`]s.
#[derive(Default)]
pub struct ServiceRegistry {
    by_name: DashMap<String, Arc<ServiceInstance>>,
    /// Registration order for deterministic sweep sequencing.
    order: RwLock<Vec<String>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance under its configured name.
    pub fn register(&self, instance: Arc<ServiceInstance>) {
        let name = instance.name().to_string();
        self.by_name.insert(name.clone(), instance);
        self.order.write().push(name);
    }

    /// Retrieves an instance by service name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ServiceInstance>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    /// Service names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Sweeps every registered service in registration order, returning the
    /// total number of expired records removed.
    ///
    /// Per-service failures are caught and logged; they neither abort the
    /// remaining sweeps nor propagate to the caller, so the periodic timer
    /// survives a corrupt service.
    pub async fn sweep(&self, now: i64) -> usize {
        let mut total = 0;
        for name in self.names() {
            let Some(instance) = self.get(&name) else {
                continue;
            };
            match instance.sweep(now).await {
                Ok(removed) => total += removed,
                Err(err) => {
                    error!(service = %name, error = %err, "failed to check for expired content");
                }
            }
        }
        total
    }
}
