//! In-memory store

use crate::store::{entry_size, KeyValueStore, StoreError};
use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard};

/// DashMap-backed store with an optional byte capacity. Thread-safe for
/// concurrent access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    capacity: Option<u64>,
    /// Serializes capacity checks with inserts and removals
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity: u64) -> Self {
        MemoryStore {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|r| r.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_guard();

        if let Some(capacity) = self.capacity {
            let replaced = self
                .entries
                .get(key)
                .map(|r| entry_size(key, r.value()))
                .unwrap_or(0);
            let needed = self.size_bytes().saturating_sub(replaced) + entry_size(key, value);
            if needed > capacity {
                return Err(StoreError::CapacityExceeded { needed, capacity });
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        self.entries.remove(key);
        Ok(())
    }

    fn remove_all(&self, keys: &[String]) -> Result<usize, StoreError> {
        let _guard = self.write_guard();
        for key in keys {
            self.entries.remove(key);
        }
        Ok(keys.len())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.iter().map(|r| r.key().clone()).collect())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let _guard = self.write_guard();
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }

    fn size_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|r| entry_size(r.key(), r.value()))
            .sum()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
