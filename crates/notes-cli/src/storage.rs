//! File-backed storage substrate: one flat file per key under a data dir.

use notes_core::storage::{KeyValueStorage, Result, StorageError};
use std::fs;
use std::path::PathBuf;

/// Durable key-value storage over flat files.
///
/// Keys are dot-separated identifiers, safe to use as file names. The
/// directory is created lazily on the first write.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::write(self.key_path(key), value).map_err(|e| StorageError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_core::storage::STORAGE_KEY;
    use tempfile::TempDir;

    #[test]
    fn test_get_absent_key() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        assert!(storage.get(STORAGE_KEY).is_none());
    }

    #[test]
    fn test_set_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(dir.path().to_path_buf());

        storage.set(STORAGE_KEY, "[]").unwrap();
        assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_set_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("cache").join("notes");
        let mut storage = FileStorage::new(nested);

        storage.set(STORAGE_KEY, "[]").unwrap();
        assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_set_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(dir.path().to_path_buf());

        storage.set(STORAGE_KEY, "old").unwrap();
        storage.set(STORAGE_KEY, "new").unwrap();
        assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("new"));
    }
}
