//! `HostBox` Server — multi-tenant content hosting with per-service HTTP servers.
//!
//! Each configured service gets its own port, its own JSON store, and a
//! compiled-in handler (clips, short links) that gives submitted content
//! its meaning.

pub mod config;
pub mod network;
pub mod plugins;
pub mod service;
pub mod storage;

pub use config::{AppConfig, ServiceConfig};
pub use network::{NetworkConfig, ServiceModule};
pub use service::{ServiceInstance, ServiceRegistry, SweepWorker};
