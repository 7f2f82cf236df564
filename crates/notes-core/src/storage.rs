//! Durable storage seam and the LocalStore that owns the persisted collection.
//!
//! The substrate is a synchronous string key-value interface. `LocalStore` is
//! the sole writer of the collection key: it loads fail-soft and saves on
//! every mutation, swallowing storage failures so the in-memory collection
//! stays authoritative for the session.
//!
//! Implementations:
//! - `InMemoryStorage` - For testing and hosts without a durable substrate
//! - `FileStorage` (in notes-cli) - Flat files under a data directory

use crate::note::NoteCollection;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Fixed key under which the serialized collection lives.
pub const STORAGE_KEY: &str = "hashnotes.notes";

/// Synchronous string key-value storage.
pub trait KeyValueStorage {
    /// Read the value under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`, overwriting any prior value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage for tests and for embedding the core where no durable
/// substrate exists.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: HashMap<String, String>,
    fail_writes: bool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail, to exercise degraded sessions.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(StorageError::QuotaExceeded("simulated".into()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Single owner of the persisted note collection.
///
/// The storage handle is injected rather than ambient so the store (and
/// everything above it) stays testable in isolation.
pub struct LocalStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> LocalStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the persisted collection.
    ///
    /// An absent key or an unparseable value loads as empty; this never
    /// errors. The poisoned value is left in place and overwritten by the
    /// next `save`.
    pub fn load(&self) -> NoteCollection {
        let Some(raw) = self.storage.get(STORAGE_KEY) else {
            return NoteCollection::new();
        };
        match serde_json::from_str(&raw) {
            Ok(collection) => collection,
            Err(e) => {
                warn!("Ignoring unparseable stored collection: {}", e);
                NoteCollection::new()
            }
        }
    }

    /// Persist `collection`, overwriting the prior value.
    ///
    /// Failures are swallowed (logged at warn): the in-memory collection
    /// remains authoritative for the session even when persistence is broken.
    pub fn save(&mut self, collection: &NoteCollection) {
        let raw = match serde_json::to_string(collection) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize collection: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(STORAGE_KEY, &raw) {
            warn!("Failed to persist collection: {}", e);
        }
    }

    /// The underlying storage handle.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
