//! On-disk store: one JSON object per cache directory

use crate::store::{entry_size, KeyValueStore, StoreError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Cache file inside the cache directory
pub const CACHE_FILE: &str = "dependencies.json";

#[derive(Debug, Default)]
struct Entries {
    map: BTreeMap<String, String>,
    /// Sum of `entry_size` over `map`
    size: u64,
    /// Changed since the last flush
    dirty: bool,
}

impl Entries {
    fn insert(&mut self, key: &str, value: &str) {
        if let Some(previous) = self.map.insert(key.to_string(), value.to_string()) {
            self.size = self.size.saturating_sub(entry_size(key, &previous));
        }
        self.size += entry_size(key, value);
        self.dirty = true;
    }

    fn remove(&mut self, key: &str) {
        if let Some(previous) = self.map.remove(key) {
            self.size = self.size.saturating_sub(entry_size(key, &previous));
            self.dirty = true;
        }
    }
}

/// Store persisted as `<dir>/dependencies.json`. The whole map is kept in
/// memory; writes only touch memory until `flush` (or drop) rewrites the
/// file with a temp file + rename. `clear` is written through at once.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
    /// Orders concurrent flushes so the newest snapshot lands last
    io_lock: Mutex<()>,
    capacity: Option<u64>,
    persists: AtomicU64,
}

impl FileStore {
    /// Open (or create) the store under `dir`. A corrupt file is discarded.
    pub fn open(dir: &Path, capacity: Option<u64>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CACHE_FILE);

        let map: BTreeMap<String, String> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding corrupt cache file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened cache {} ({} entries)", path.display(), map.len());
        let size = map.iter().map(|(k, v)| entry_size(k, v)).sum();
        Ok(FileStore {
            path,
            entries: Mutex::new(Entries {
                map,
                size,
                dirty: false,
            }),
            io_lock: Mutex::new(()),
            capacity,
            persists: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file has been rewritten by this store.
    pub fn persist_count(&self) -> u64 {
        self.persists.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_file(&self, json: &str) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        self.persists.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();

        if let Some(capacity) = self.capacity {
            let replaced = entries.map.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
            let needed = entries.size.saturating_sub(replaced) + entry_size(key, value);
            if needed > capacity {
                return Err(StoreError::CapacityExceeded { needed, capacity });
            }
        }

        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    fn remove_all(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(keys.len())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().map.keys().cloned().collect())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let count = {
            let mut entries = self.lock();
            let count = entries.map.len();
            entries.map.clear();
            entries.size = 0;
            entries.dirty = true;
            count
        };
        self.flush()?;
        Ok(count)
    }

    fn size_bytes(&self) -> u64 {
        self.lock().size
    }

    fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Rewrite the file if anything changed since the last flush.
    fn flush(&self) -> Result<(), StoreError> {
        let _io = self
            .io_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let json = {
            let mut entries = self.lock();
            if !entries.dirty {
                return Ok(());
            }
            let json = serde_json::to_string(&entries.map)?;
            entries.dirty = false;
            json
        };

        if let Err(e) = self.write_file(&json) {
            self.lock().dirty = true;
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Error writing cache file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path(), None).unwrap();
            store.set("cookies", r#"{"dependencies":[],"storedAt":1}"#).unwrap();
        }
        let store = FileStore::open(dir.path(), None).unwrap();
        assert_eq!(
            store.get("cookies").unwrap().as_deref(),
            Some(r#"{"dependencies":[],"storedAt":1}"#)
        );
        assert!(dir.path().join(CACHE_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), "{ truncated").unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path(), Some(20)).unwrap();
        // ("ab".len() + "cdef".len()) * 2 = 12 bytes
        store.set("ab", "cdef").unwrap();
        let err = store.set("gh", "ijkl").unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { needed: 24, capacity: 20 }));
        // Overwriting in place only charges the difference
        store.set("ab", "cdefg").unwrap();
        assert_eq!(store.size_bytes(), 14);
    }

    #[test]
    fn test_clear_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);
        assert_eq!(store.clear().unwrap(), 1);

        let reopened = FileStore::open(dir.path(), None).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_writes_are_buffered_until_flush() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        for i in 0..100 {
            store.set(&format!("pkg-{i}"), "[]").unwrap();
        }
        store.remove_all(&["pkg-0".to_string(), "pkg-1".to_string()]).unwrap();
        assert_eq!(store.persist_count(), 0);
        assert!(!dir.path().join(CACHE_FILE).exists());

        store.flush().unwrap();
        store.flush().unwrap();
        assert_eq!(store.persist_count(), 1);

        let content = std::fs::read_to_string(dir.path().join(CACHE_FILE)).unwrap();
        let on_disk: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk.len(), 98);
        let expected: u64 = on_disk.iter().map(|(k, v)| entry_size(k, v)).sum();
        assert_eq!(store.size_bytes(), expected);
    }
}
