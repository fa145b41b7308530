//! Key/Value Storage Adapters
//!
//! - [`MemoryStore`]: process-local map, used in tests and when persistence
//!   is disabled
//! - [`FileStore`]: JSON object file, rewritten atomically on every write
//!
//! Both implement [`KeyValueStore`] with browser localStorage semantics:
//! string keys, string values, last write wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::application::ports::{KeyValueStore, StorageError};

// =============================================================================
// Memory
// =============================================================================

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StorageError> {
        self.entries.write().extend(entries);
        Ok(())
    }

    fn remove_many(&self, keys: Vec<String>) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        for key in &keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        keys_with_prefix(&self.entries.read(), prefix)
    }
}

// =============================================================================
// File
// =============================================================================

/// Store persisted as a single JSON object file.
///
/// The whole map is kept in memory; each write replaces the file through a
/// temporary sibling and a rename so readers never see a partial file. The
/// in-memory map only changes once the file write succeeded, so a failed
/// write is never visible to readers.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store, reading the file if it exists.
    ///
    /// A missing file starts an empty store. An unreadable or corrupt file
    /// is logged and replaced on the next write, the same way a browser
    /// discards a damaged localStorage.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt store file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Store file unreadable, starting empty");
                BTreeMap::new()
            }
        };

        tracing::info!(path = %path.display(), keys = entries.len(), "Key/value store opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        })
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut next = self.entries.read().clone();
        apply(&mut next);
        let content = serde_json::to_vec_pretty(&next)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.persist(&content)?;
        *self.entries.write() = next;
        Ok(())
    }

    fn persist(&self, content: &[u8]) -> Result<(), StorageError> {
        let tmp_path = self.tmp_path();
        let result = Self::write_then_rename(&tmp_path, &self.path, content);
        if result.is_err() && tmp_path.is_file() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn write_then_rename(
        tmp_path: &Path,
        path: &Path,
        content: &[u8],
    ) -> Result<(), StorageError> {
        let mut file = fs::File::create(tmp_path).map_err(|e| io_error(tmp_path, &e))?;
        file.write_all(content)
            .and_then(|()| file.sync_all())
            .map_err(|e| io_error(tmp_path, &e))?;
        drop(file);

        fs::rename(tmp_path, path).map_err(|e| io_error(path, &e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StorageError> {
        self.update(|map| map.extend(entries))
    }

    fn remove_many(&self, keys: Vec<String>) -> Result<(), StorageError> {
        let present: Vec<String> = {
            let entries = self.entries.read();
            keys.into_iter().filter(|k| entries.contains_key(k)).collect()
        };
        if present.is_empty() {
            return Ok(());
        }
        self.update(|map| {
            for key in &present {
                map.remove(key);
            }
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        keys_with_prefix(&self.entries.read(), prefix)
    }
}

fn keys_with_prefix(entries: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

fn io_error(path: &Path, error: &std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn put(store: &FileStore, key: &str, value: &str) -> Result<(), StorageError> {
        store.set_many(vec![(key.to_string(), value.to_string())])
    }

    #[test]
    fn memory_store_prefix_listing() {
        let store = MemoryStore::new();
        store
            .set_many(vec![
                ("ticker_BTCUSDT".to_string(), "{}".to_string()),
                ("ticker_ETHUSDT".to_string(), "{}".to_string()),
                ("bybit-spot".to_string(), String::new()),
            ])
            .unwrap();

        assert_eq!(
            store.keys_with_prefix("ticker_"),
            vec!["ticker_BTCUSDT".to_string(), "ticker_ETHUSDT".to_string()]
        );
        store
            .remove_many(vec!["ticker_BTCUSDT".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        put(&store, "color-mode", "red-up").unwrap();
        put(&store, "bybit-spot", "BTC/USDT=BTCUSDT").unwrap();
        store.remove_many(vec!["bybit-spot".to_string()]).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("color-mode").as_deref(), Some("red-up"));
        assert_eq!(reopened.get("bybit-spot"), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        put(&store, "color-mode", "green-up").unwrap();

        // A directory in the temp file's place makes the write fail.
        let tmp_path = dir.path().join("store.json.tmp");
        fs::create_dir(&tmp_path).unwrap();

        let err = put(&store, "color-mode", "red-up").unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(store.get("color-mode").as_deref(), Some("green-up"));
        assert!(store.remove_many(vec!["color-mode".to_string()]).is_err());
        assert_eq!(store.get("color-mode").as_deref(), Some("green-up"));

        fs::remove_dir(&tmp_path).unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("color-mode").as_deref(), Some("green-up"));
    }

    #[test]
    fn remove_many_ignores_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store
            .set_many(vec![
                ("ticker_BTCUSDT".to_string(), "{}".to_string()),
                ("ticker_DOGEUSDT".to_string(), "{}".to_string()),
            ])
            .unwrap();

        store
            .remove_many(vec!["ticker_DOGEUSDT".to_string(), "missing".to_string()])
            .unwrap();
        store.remove_many(vec!["missing".to_string()]).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.keys_with_prefix("ticker_"), vec!["ticker_BTCUSDT".to_string()]);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.keys_with_prefix(""), Vec::<String>::new());

        put(&store, "k", "v").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"k\""));
    }
}
