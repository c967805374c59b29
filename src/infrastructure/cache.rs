//! TTL Cache
//!
//! DashMap-backed TTL store for resolved records with lazy eviction.

use crate::domain::entities::{GeoRecord, LookupKey};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached record together with its expiry deadline.
///
/// Entries are replaced wholesale on `set`, never mutated in place.
#[derive(Debug, Clone)]
struct CacheEntry {
    record: GeoRecord,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL key-value store for enriched records.
///
/// `get` on an expired entry behaves as a miss and removes the entry
/// (lazy eviction). An optional background GC task can sweep expired
/// entries; correctness does not depend on it.
pub struct TtlCache {
    entries: Arc<DashMap<LookupKey, CacheEntry>>,
}

impl TtlCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Look up a record, evicting it first if its TTL has elapsed.
    pub fn get(&self, key: &LookupKey) -> Option<GeoRecord> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.record.clone()),
            Some(_) => {}
            None => return None,
        }
        // expired - lazily evict
        self.entries.remove(key);
        tracing::debug!(key = %key, "cache entry expired");
        None
    }

    /// Store a record with the given TTL, overwriting any existing entry.
    pub fn set(&self, key: LookupKey, record: GeoRecord, ttl: Duration) {
        let entry = CacheEntry {
            record,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key, entry);
    }

    /// Remove any entry for the key. Idempotent.
    pub fn remove(&self, key: &LookupKey) {
        self.entries.remove(key);
    }

    /// Number of entries, including any not yet lazily evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Start a background sweep task.
    ///
    /// Lazy eviction already keeps reads correct; the sweep only bounds
    /// memory held by keys that are never read again.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start_gc(&self, interval: Duration) {
        let entries = self.entries.clone();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let now = Instant::now();
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired(now));
                let removed = before - entries.len();

                if removed > 0 {
                    tracing::debug!("cache GC removed {} expired entries", removed);
                }
            }
        });
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
