//! Dependency cache over a key-value store

use crate::store::{KeyValueStore, StoreError};
use chrono::{DateTime, Utc};
use depgraph_core::PackageName;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Key holding the epoch-millisecond time of the most recent write.
/// A package with this exact name is never cached.
pub const LAST_ACCESSED_KEY: &str = "lastAccessed";

/// Stored value for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub dependencies: Vec<PackageName>,
    /// Epoch milliseconds
    pub stored_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub size_kb: f64,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
}

/// What the traversal engine needs from a cache. All operations are
/// best-effort: storage failures are logged and never surface to callers.
pub trait CacheStore: Send + Sync {
    /// Cached direct dependencies. `None` means absent, which is distinct
    /// from a cached empty list.
    fn get(&self, name: &PackageName) -> Option<Vec<PackageName>>;

    /// Store `dependencies` for `name`, overwriting any previous entry.
    fn put(&self, name: &PackageName, dependencies: &[PackageName]);

    /// Remove the older half (rounded up) of the entries by store time.
    fn evict_oldest_half(&self) -> usize;

    /// Remove every entry, returning how many package entries were removed.
    fn clear(&self) -> usize;

    fn stats(&self) -> CacheStats;

    /// Time of the last successful write, if recorded.
    fn last_accessed(&self) -> Option<DateTime<Utc>>;

    /// Persist buffered writes. Blocking; async callers should run it on a
    /// blocking thread.
    fn flush(&self);
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// `CacheStore` over any `KeyValueStore`
pub struct DependencyCache<K> {
    store: K,
    clock: Clock,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl<K: KeyValueStore> DependencyCache<K> {
    pub fn new(store: K) -> Self {
        Self::with_clock(store, Utc::now)
    }

    /// Use `clock` for entry timestamps instead of the system time.
    pub fn with_clock(
        store: K,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        DependencyCache {
            store,
            clock: Box::new(clock),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    fn package_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| key != LAST_ACCESSED_KEY)
                .collect(),
            Err(e) => {
                tracing::warn!("Error listing cache keys: {}", e);
                Vec::new()
            }
        }
    }

    /// Write `value`, evicting and retrying once if the store is full.
    fn write(&self, key: &str, value: &str) -> bool {
        let err = match self.store.set(key, value) {
            Ok(()) => return true,
            Err(e) => e,
        };

        if let StoreError::CapacityExceeded { needed, capacity } = err {
            let evicted = self.evict_oldest_half();
            tracing::debug!(
                "Cache full ({} of {} bytes), evicted {} entries",
                needed,
                capacity,
                evicted
            );
            match self.store.set(key, value) {
                Ok(()) => return true,
                Err(e) => tracing::warn!("Dropping cache write for {}: {}", key, e),
            }
        } else {
            tracing::warn!("Error writing cache entry {}: {}", key, err);
        }
        false
    }

    fn miss(&self) -> Option<Vec<PackageName>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

impl<K: KeyValueStore> CacheStore for DependencyCache<K> {
    fn get(&self, name: &PackageName) -> Option<Vec<PackageName>> {
        if name.as_str() == LAST_ACCESSED_KEY {
            return self.miss();
        }

        let raw = match self.store.get(name.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.miss(),
            Err(e) => {
                tracing::warn!("Error reading cache entry {}: {}", name, e);
                return self.miss();
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.dependencies)
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry {}: {}", name, e);
                self.miss()
            }
        }
    }

    fn put(&self, name: &PackageName, dependencies: &[PackageName]) {
        if name.as_str() == LAST_ACCESSED_KEY {
            tracing::debug!("Not caching reserved key {}", name);
            return;
        }

        let now = (self.clock)();
        let entry = CacheEntry {
            dependencies: dependencies.to_vec(),
            stored_at: now.timestamp_millis(),
        };
        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Error serializing cache entry {}: {}", name, e);
                return;
            }
        };

        if self.write(name.as_str(), &value) {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.write(LAST_ACCESSED_KEY, &now.timestamp_millis().to_string());
        }
    }

    fn evict_oldest_half(&self) -> usize {
        let mut stamped: Vec<(i64, String)> = self
            .package_keys()
            .into_iter()
            .filter_map(|key| {
                let raw = self.store.get(&key).ok()??;
                let entry: CacheEntry = serde_json::from_str(&raw).ok()?;
                Some((entry.stored_at, key))
            })
            .collect();
        stamped.sort();

        let count = stamped.len().div_ceil(2);
        let victims: Vec<String> = stamped.into_iter().take(count).map(|(_, key)| key).collect();

        match self.store.remove_all(&victims) {
            Ok(removed) => {
                self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
                tracing::debug!("Evicted {} cache entries", removed);
                removed
            }
            Err(e) => {
                tracing::warn!("Error evicting cache entries: {}", e);
                0
            }
        }
    }

    fn clear(&self) -> usize {
        let entries = self.package_keys().len();
        if let Err(e) = self.store.clear() {
            tracing::warn!("Error clearing cache: {}", e);
            return 0;
        }

        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        tracing::info!("Cleared {} cache entries", entries);
        entries
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.package_keys().len(),
            size_kb: self.store.size_bytes() as f64 / 1024.0,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn last_accessed(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(LAST_ACCESSED_KEY).ok()??;
        let millis = raw.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    fn flush(&self) {
        if let Err(e) = self.store.flush() {
            tracing::warn!("Error flushing cache: {}", e);
        }
    }
}

impl<K> std::fmt::Debug for DependencyCache<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .field("writes", &self.writes.load(Ordering::Relaxed))
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
