//! Content store: one service's durable state plus id allocation.
//!
//! The store owns a [`Store`] document and its on-disk JSON file. Every
//! mutation rewrites the full file (small documents, last-writer-wins); the
//! service instance serializes writers, so within one process the file always
//! reflects the last completed mutation.

use std::path::{Path, PathBuf};

use hostbox_core::record::{ContentRecord, Store};
use rand::Rng;
use serde_json::Value;
use tracing::warn;

/// Allocation retries before giving up on a fresh id.
const MAX_ID_ATTEMPTS: u32 = 10;

/// Storage-layer failures.
///
/// Corrupt store files are handled inside [`ContentStore::load`] and never
/// surface here; these variants cover real I/O and serialization faults plus
/// id-space exhaustion.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("couldn't generate a new ID in {attempts} tries")]
    IdExhausted { attempts: u32 },
}

/// A batch of entries to merge into one of the store's named sequences.
///
/// Closed variant set instead of a string field key, so an unknown field name
/// is unrepresentable.
#[derive(Debug)]
pub enum StoreField {
    Content(Vec<ContentRecord>),
    Users(Vec<Value>),
}

/// Durable, crash-tolerant persistence for one service, plus collision-free
/// id allocation.
#[derive(Debug)]
pub struct ContentStore {
    path: PathBuf,
    store: Store,
}

impl ContentStore {
    /// Loads the store file, degrading instead of failing on corruption.
    ///
    /// A missing file initializes an empty store and persists it. An existing
    /// file that fails to parse is copied (not moved) to a `.bak` sibling,
    /// then replaced by a persisted empty store with a logged warning — the
    /// in-memory state is never built from corrupt bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only for real filesystem faults (unreadable
    /// file, failed backup copy, failed write of the fresh store).
    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let store = Self {
                    path,
                    store: Store::default(),
                };
                store.persist()?;
                return Ok(store);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let store = match serde_json::from_slice::<Store>(&bytes) {
            Ok(store) => store,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read store file, backing up and resetting");
                let backup = backup_path(&path);
                std::fs::copy(&path, &backup).map_err(|source| StoreError::Io {
                    path: backup,
                    source,
                })?;
                Store::default()
            }
        };

        let store = Self { path, store };
        store.persist()?;
        Ok(store)
    }

    /// Merges `field`'s entries into the matching sequence by appending, then
    /// rewrites the full store file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] / [`StoreError::Serialize`] if the rewrite
    /// fails; the append itself cannot fail.
    pub fn save(&mut self, field: StoreField) -> Result<(), StoreError> {
        match field {
            StoreField::Content(records) => self.store.content.extend(records),
            StoreField::Users(entries) => self.store.users.extend(entries),
        }
        self.persist()
    }

    /// Rewrites the store file from the current in-memory state, unchanged.
    ///
    /// Used to materialize the initial empty file and to persist sweep
    /// results.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] / [`StoreError::Serialize`] on write
    /// failure.
    pub fn persist(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.store)?;
        std::fs::write(&self.path, bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Draws `id_length` characters independently and uniformly from
    /// `id_chars`, retrying on collision with an existing record.
    ///
    /// Non-cryptographic collision avoidance: acceptable because the id space
    /// is expected to vastly exceed the record count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IdExhausted`] after [`MAX_ID_ATTEMPTS`] total
    /// attempts (or immediately for an empty alphabet).
    pub fn allocate_id(&self, id_length: usize, id_chars: &str) -> Result<String, StoreError> {
        let alphabet: Vec<char> = id_chars.chars().collect();
        if alphabet.is_empty() {
            return Err(StoreError::IdExhausted { attempts: 0 });
        }

        let mut rng = rand::rng();
        let mut attempts = 0;
        while attempts < MAX_ID_ATTEMPTS {
            attempts += 1;
            let id: String = (0..id_length)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            if self.find(&id).is_none() {
                return Ok(id);
            }
        }
        Err(StoreError::IdExhausted { attempts })
    }

    /// Linear lookup by exact id. Absence is not an error.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ContentRecord> {
        self.store.content.iter().find(|record| record.id == id)
    }

    /// Marks and compacts expired records in two explicit passes.
    ///
    /// Pass one marks every live record whose `creation_date + expire_after`
    /// lies before `now`; pass two rebuilds the sequence without the marked
    /// records, so no `deleted` marker survives the sweep. Returns the removed
    /// ids; the caller persists when the result is non-empty.
    pub fn expire(&mut self, now: i64, expire_after: i64) -> Vec<String> {
        let mut removed = Vec::new();
        for record in &mut self.store.content {
            if record.deleted {
                continue;
            }
            if now > record.creation_date + expire_after {
                record.deleted = true;
                removed.push(record.id.clone());
            }
        }
        if !removed.is_empty() {
            self.store.content.retain(|record| !record.deleted);
        }
        removed
    }

    /// Live records, insertion order = creation order.
    #[must_use]
    pub fn content(&self) -> &[ContentRecord] {
        &self.store.content
    }

    /// The reserved `users` sequence. Round-trips through persistence
    /// unchanged; no current semantics.
    #[must_use]
    pub fn users(&self) -> &[Value] {
        &self.store.users
    }

    /// Path of the backing store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
