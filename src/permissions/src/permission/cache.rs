//! Bounded, concurrent cache of parsed permissions
//!
//! Parsing is a pure function of the raw string, so entries can be dropped
//! at any moment without affecting results.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ParseError, Permission};

/// Permission cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCacheConfig {
    /// Maximum number of cached permissions
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries not accessed for this long are dropped
    #[serde(default = "default_idle_ttl", rename = "idle_ttl_secs", with = "duration_secs")]
    pub idle_ttl: Duration,

    /// Capacity reserved up front
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

fn default_max_entries() -> usize {
    5_000
}

fn default_idle_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_initial_capacity() -> usize {
    100
}

impl Default for PermissionCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            idle_ttl: default_idle_ttl(),
            initial_capacity: default_initial_capacity(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Cached permission with its last access stamp
struct CacheEntry {
    permission: Arc<Permission>,
    /// Milliseconds since the cache epoch
    last_access: AtomicU64,
}

impl CacheEntry {
    fn new(permission: Arc<Permission>, now: u64) -> Self {
        Self {
            permission,
            last_access: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_access.store(now, Ordering::Relaxed);
    }

    fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.last_access()) > ttl_ms
    }
}

/// Thread-safe permission cache with size bound and expire-after-access
///
/// - Hits take a shard read lock only; the access stamp is atomic
/// - Concurrent misses for the same string may both parse; the last insert
///   wins and both results are equal
/// - Parse failures are never cached
/// - The size bound is enforced on insert; concurrent writers can overshoot
///   it by one entry each until the next insert makes room
pub struct PermissionCache {
    entries: DashMap<String, CacheEntry>,
    config: PermissionCacheConfig,
    epoch: Instant,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl PermissionCache {
    /// Create a cache with the given configuration
    pub fn new(config: PermissionCacheConfig) -> Self {
        Self {
            entries: DashMap::with_capacity(config.initial_capacity),
            config,
            epoch: Instant::now(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the parsed permission for `raw`, parsing it on a miss
    pub fn get_or_parse(&self, raw: &str) -> Result<Arc<Permission>, ParseError> {
        let now = self.now_ms();
        let ttl_ms = self.ttl_ms();

        if let Some(entry) = self.entries.get(raw) {
            if !entry.is_expired(now, ttl_ms) {
                entry.touch(now);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.permission.clone());
            }

            drop(entry);
            if self
                .entries
                .remove_if(raw, |_, entry| entry.is_expired(now, ttl_ms))
                .is_some()
            {
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let permission = Arc::new(Permission::parse(raw)?);

        if self.config.max_entries == 0 {
            return Ok(permission);
        }
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(raw) {
            self.make_room(now);
        }
        self.entries
            .insert(raw.to_string(), CacheEntry::new(permission.clone(), now));

        Ok(permission)
    }

    /// Number of cached permissions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reset statistics
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.config.max_entries,
        }
    }

    /// Cache configuration
    pub fn config(&self) -> &PermissionCacheConfig {
        &self.config
    }

    /// Purge expired entries, then evict the least recently used tenth
    fn make_room(&self, now: u64) {
        let ttl_ms = self.ttl_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl_ms));
        let expired = before.saturating_sub(self.entries.len());
        self.expirations.fetch_add(expired as u64, Ordering::Relaxed);

        if self.entries.len() < self.config.max_entries {
            return;
        }

        let to_remove = (self.config.max_entries / 10).max(1);
        let mut stamps: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_access()))
            .collect();
        stamps.sort_by_key(|(_, stamp)| *stamp);

        for (key, _) in stamps.into_iter().take(to_remove) {
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        debug!(expired, evicted = to_remove, "Permission cache full, evicted entries");
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn ttl_ms(&self) -> u64 {
        u64::try_from(self.config.idle_ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(PermissionCacheConfig::default())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small_cache(max_entries: usize, idle_ttl: Duration) -> PermissionCache {
        PermissionCache::new(PermissionCacheConfig {
            max_entries,
            idle_ttl,
            initial_capacity: 4,
        })
    }

    #[test]
    fn test_cache_hit_miss() {
        let cache = PermissionCache::default();

        let first = cache.get_or_parse("document:read").unwrap();
        let second = cache.get_or_parse("document:read").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = PermissionCache::default();

        assert_eq!(
            cache.get_or_parse("a::b").unwrap_err(),
            ParseError::EmptySegment("a::b".to_string())
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = small_cache(10, Duration::from_secs(3600));

        for i in 0..50 {
            cache.get_or_parse(&format!("resource:{}", i)).unwrap();
        }

        assert!(cache.len() <= 10);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_eviction_keeps_recently_used_entries() {
        let cache = small_cache(10, Duration::from_secs(3600));

        for i in 0..10 {
            cache.get_or_parse(&format!("resource:{}", i)).unwrap();
            thread::sleep(Duration::from_millis(2));
        }
        // Refresh the oldest entry so it is no longer the eviction candidate
        cache.get_or_parse("resource:0").unwrap();
        thread::sleep(Duration::from_millis(2));

        cache.get_or_parse("resource:new").unwrap();

        let hits_before = cache.stats().hits;
        cache.get_or_parse("resource:0").unwrap();
        assert_eq!(cache.stats().hits, hits_before + 1);
    }

    #[test]
    fn test_idle_entries_expire() {
        let cache = small_cache(100, Duration::from_millis(20));

        cache.get_or_parse("document:read").unwrap();
        thread::sleep(Duration::from_millis(60));
        cache.get_or_parse("document:read").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_huge_idle_ttl_does_not_wrap() {
        // u64::MAX seconds overflows u64 milliseconds
        let cache = small_cache(100, Duration::from_secs(u64::MAX));

        cache.get_or_parse("document:read").unwrap();
        thread::sleep(Duration::from_millis(5));
        cache.get_or_parse("document:read").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.expirations, 0);
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = small_cache(0, Duration::from_secs(60));

        let perm = cache.get_or_parse("a:b").unwrap();
        assert_eq!(perm.to_string(), "a:b");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = PermissionCache::default();
        cache.get_or_parse("a").unwrap();
        cache.get_or_parse("a").unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { max_entries: 5_000, ..Default::default() });
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(small_cache(64, Duration::from_secs(3600)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let raw = format!("tenant:{}:doc:{}", t % 2, i % 40);
                        let perm = cache.get_or_parse(&raw).unwrap();
                        assert_eq!(perm.to_string(), raw);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Concurrent inserts may overshoot by at most one entry per writer
        assert!(cache.len() <= 64 + 8);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PermissionCacheConfig =
            serde_json::from_str(r#"{"max_entries": 10, "idle_ttl_secs": 30}"#).unwrap();

        assert_eq!(config.max_entries, 10);
        assert_eq!(config.idle_ttl, Duration::from_secs(30));
        assert_eq!(config.initial_capacity, 100);
    }
}
