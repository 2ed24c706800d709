//! Key-value persistence layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would exceed the store's byte budget.
    #[error("storage capacity exceeded ({needed} bytes needed, {capacity} available)")]
    CapacityExceeded { needed: u64, capacity: u64 },
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A string key-value store. Implementations must be safe to share across
/// concurrent traversals.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite. May fail with `StoreError::CapacityExceeded`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove several keys, returning how many were requested.
    fn remove_all(&self, keys: &[String]) -> Result<usize, StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(keys.len())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Remove everything, returning how many keys were removed.
    fn clear(&self) -> Result<usize, StoreError>;

    /// Accounted size of all entries, see `entry_size`.
    fn size_bytes(&self) -> u64;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push buffered writes to durable storage. Blocking.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Bytes charged for one entry: key and value counted as UTF-16, the way
/// browser local storage measures its quota.
pub fn entry_size(key: &str, value: &str) -> u64 {
    ((key.len() + value.len()) * 2) as u64
}
