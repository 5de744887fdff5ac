//! Durable per-service persistence.
//!
//! One [`ContentStore`] per service instance: it owns the on-disk JSON
//! document, allocates collision-checked ids, and runs the two-pass expiry
//! compaction. Corrupt store files are backed up and replaced, never
//! propagated to callers.

pub mod content_store;

pub use content_store::{ContentStore, StoreError, StoreField};
