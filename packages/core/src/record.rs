//! Record types for the content store.
//!
//! Defines [`ContentRecord`], one stored item of user-submitted content plus
//! metadata, and [`Store`], the durable document holding one service's full
//! state. Both serialize with camelCase keys so store files written by earlier
//! deployments parse unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored item of user-submitted content plus metadata.
///
/// The fixed fields are owned by the service runtime; everything a handler
/// attaches (file path, MIME type, target URL, ...) lives in the flattened
/// `extra` map, which round-trips unknown keys through persistence unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Identifier, unique within one service's store.
    pub id: String,
    /// Wall-clock creation time in millis since epoch. Set once, immutable.
    pub creation_date: i64,
    /// Transient sweep marker. Never persisted: expired records are removed
    /// from the store, not kept tombstoned.
    #[serde(skip)]
    pub deleted: bool,
    /// Handler-attached payload metadata, keyed camelCase on disk
    /// (`filePath`, `mimeType`, `url`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentRecord {
    /// Creates a record with no handler metadata attached yet.
    #[must_use]
    pub fn new(id: String, creation_date: i64) -> Self {
        Self {
            id,
            creation_date,
            deleted: false,
            extra: Map::new(),
        }
    }

    /// Returns a handler-attached string field, or `None` if absent or not a
    /// string.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Attaches (or replaces) a handler metadata field.
    pub fn set_extra(&mut self, key: &str, value: impl Into<Value>) {
        self.extra.insert(key.to_string(), value.into());
    }
}

/// The durable document for one service: live content records plus the
/// reserved `users` slot.
///
/// `users` is persisted but never populated or read by the bundled handlers.
/// It is a forward-compatibility placeholder and must round-trip unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    /// Live records, insertion order = creation order.
    #[serde(default)]
    pub content: Vec<ContentRecord>,
    /// Reserved slot with no current semantics.
    #[serde(default)]
    pub users: Vec<Value>,
}
