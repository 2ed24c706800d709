//! Dependency cache for depgraph
//!
//! Memoizes per-package dependency lists in a key-value store so repeated
//! traversals skip the registry. Capacity failures on write are absorbed by
//! evicting the oldest half of the entries and retrying once.

pub mod store;
pub mod memory;
pub mod file;
pub mod cache;
pub mod expiry;


pub use store::{KeyValueStore, StoreError, entry_size};
pub use memory::MemoryStore;
pub use file::{FileStore, CACHE_FILE};
pub use cache::{CacheStore, DependencyCache, CacheEntry, CacheStats, LAST_ACCESSED_KEY};
pub use expiry::{expire_if_stale, DEFAULT_MAX_AGE};
