//! Startup expiry of stale caches

use crate::cache::CacheStore;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Caches untouched for longer than this are wiped at startup.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Clear `cache` if its last write is older than `max_age` at `now`.
///
/// A cache holding entries but no last-accessed marker cannot be aged and
/// is treated as stale. Returns the number of entries removed when a clear
/// happened.
pub fn expire_if_stale(
    cache: &dyn CacheStore,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Option<usize> {
    match cache.last_accessed() {
        Some(last) => {
            let elapsed_ms = now.timestamp_millis().saturating_sub(last.timestamp_millis());
            if elapsed_ms <= 0 || (elapsed_ms as u128) <= max_age.as_millis() {
                return None;
            }
            tracing::info!("Cache last written {} ago, clearing", humanize(elapsed_ms));
        }
        None => {
            if cache.stats().entries == 0 {
                return None;
            }
            tracing::info!("Cache has no last-accessed marker, clearing");
        }
    }
    Some(cache.clear())
}

fn humanize(ms: i64) -> String {
    let hours = ms / 3_600_000;
    if hours >= 1 {
        format!("{}h", hours)
    } else {
        format!("{}m", ms / 60_000)
    }
}
