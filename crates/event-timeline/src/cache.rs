//! Bounded key/value cache with TTL expiry and LRU eviction.
//!
//! [`BoundedCache`] backs both per-key entry lookups and per-filter query
//! results in the [`Timeline`](crate::Timeline). Entries expire a fixed TTL
//! after insertion; expired entries are dropped lazily on access and
//! proactively by [`BoundedCache::sweep_expired`].

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SharedClock, SystemClock};

/// Configuration for a bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Time-to-live in seconds, measured from insertion.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Creates a config with the given capacity and TTL.
    #[must_use]
    pub const fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Returns the TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A cached value with access bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Unix milliseconds at insertion.
    pub inserted_at: i64,
    /// Unix milliseconds at the latest hit.
    pub last_accessed_at: i64,
    /// Number of hits since insertion.
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now: i64) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    fn is_expired(&self, now: i64, ttl_millis: i64) -> bool {
        now - self.inserted_at > ttl_millis
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live entries.
    pub entries: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that returned nothing.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or `0.0` before the first lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe TTL + LRU cache.
///
/// Recency is tracked by the underlying [`LruCache`]: both insertion and a
/// successful lookup promote an entry, so among entries never read the
/// earliest inserted is evicted first.
pub struct BoundedCache<K, V>
where
    K: Hash + Eq,
{
    name: &'static str,
    config: CacheConfig,
    clock: SharedClock,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache using the system clock.
    #[must_use]
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    ///
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn with_clock(name: &'static str, config: CacheConfig, clock: SharedClock) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            config,
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up a value, refreshing its access bookkeeping on a hit.
    ///
    /// Expired entries count as a miss and are removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();
        let mut entries = self.entries.lock();

        let Some(expired) = entries.peek(key).map(|entry| entry.is_expired(now, ttl)) else {
            drop(entries);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if expired {
            entries.pop(key);
            drop(entries);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, "expired entry dropped on access");
            return None;
        }

        let value = entries.get_mut(key).map(|entry| {
            entry.last_accessed_at = now;
            entry.access_count += 1;
            entry.value.clone()
        });
        drop(entries);
        self.hits.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Returns the full cache record for `key` without touching recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.lock().peek(key).cloned()
    }

    /// Inserts a value, evicting the least recently used entry if full.
    pub fn put(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, self.clock.now_millis());
        let displaced = self.entries.lock().push(key.clone(), entry);

        // `push` hands back either the replaced value for `key` or an evicted entry.
        if let Some((old_key, _)) = displaced {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, "evicted least recently used entry");
            }
        }
    }

    /// Removes a single entry. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Returns true if `key` is present and unexpired, without counting a lookup.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now, ttl))
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();
        let mut entries = self.entries.lock();

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        drop(entries);

        let removed = expired.len();
        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(cache = self.name, removed, "swept expired entries");
        }
        removed
    }

    /// Returns the number of stored entries, including not-yet-swept expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.config.capacity.max(1),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Hit rate since creation.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn ttl_millis(&self) -> i64 {
        self.config.ttl().as_millis() as i64
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
