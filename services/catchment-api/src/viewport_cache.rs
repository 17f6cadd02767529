//! Short-lived cache of serialized choropleth responses.
//!
//! Map clients fire the same viewport query several times while panning
//! settles. Entries live for a few hundred milliseconds; viewport
//! selection is deterministic, so a cached body is identical to what a
//! fresh query would produce.
//!
//! ## Eviction Strategy
//! - Memory-based LRU eviction when size limit is exceeded
//! - TTL-based expiration on read (lazy)

use bytes::Bytes;
use catchment_common::BoundingBox;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MAX_ENTRIES: usize = 4096;

/// Cache key: viewport quantized to 6 decimals, scenario, column, limit.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ViewportCacheKey(String);

impl ViewportCacheKey {
    pub fn new(bbox: &BoundingBox, scenario: &str, column: &str, limit: usize) -> Self {
        Self(format!("{}|{}|{}|{}", bbox.cache_key(), scenario, column, limit))
    }
}

struct CachedResponse {
    data: Bytes,
    inserted_at: Instant,
}

impl CachedResponse {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Statistics for the viewport cache.
#[derive(Default)]
pub struct ViewportCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    /// Entries dropped because their TTL ran out.
    pub expired: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
}

impl ViewportCacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory LRU cache for viewport responses, bounded by bytes and TTL.
pub struct ViewportCache {
    cache: Mutex<LruCache<ViewportCacheKey, CachedResponse>>,
    max_bytes: u64,
    ttl: Duration,
    stats: ViewportCacheStats,
}

impl ViewportCache {
    pub fn new(max_mb: usize, ttl: Duration) -> Self {
        let max_entries = NonZeroUsize::new(MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN);

        tracing::info!(
            max_mb,
            ttl_ms = ttl.as_millis() as u64,
            max_entries = MAX_ENTRIES,
            "Viewport cache initialized"
        );

        Self {
            cache: Mutex::new(LruCache::new(max_entries)),
            max_bytes: (max_mb * 1024 * 1024) as u64,
            ttl,
            stats: ViewportCacheStats::default(),
        }
    }

    /// Whether caching is switched off (zero TTL or zero size).
    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero() || self.max_bytes == 0
    }

    pub async fn get(&self, key: &ViewportCacheKey) -> Option<Bytes> {
        if self.is_disabled() {
            return None;
        }
        let mut cache = self.cache.lock().await;

        let expired = match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(removed) = cache.pop(key) {
                self.stats.size_bytes.fetch_sub(removed.size(), Ordering::Relaxed);
                self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn put(&self, key: ViewportCacheKey, data: Bytes) {
        if self.is_disabled() || data.len() as u64 > self.max_bytes {
            return;
        }
        let entry = CachedResponse {
            data,
            inserted_at: Instant::now(),
        };
        let entry_size = entry.size();

        let mut cache = self.cache.lock().await;

        if let Some(old) = cache.pop(&key) {
            self.stats.size_bytes.fetch_sub(old.size(), Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
        }

        // Evict oldest entries until the new one fits
        let target = self.max_bytes - entry_size;
        let mut evicted = 0u64;
        while self.stats.size_bytes.load(Ordering::Relaxed) > target {
            match cache.pop_lru() {
                Some((_, removed)) => {
                    self.stats.size_bytes.fetch_sub(removed.size(), Ordering::Relaxed);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(evicted, Ordering::Relaxed);
            tracing::debug!(evicted, "Viewport cache evicted entries");
        }

        // Entry-count eviction by the LRU itself
        if let Some((_, pushed_out)) = cache.push(key, entry) {
            self.stats.size_bytes.fetch_sub(pushed_out.size(), Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
        self.stats.size_bytes.fetch_add(entry_size, Ordering::Relaxed);
    }

    pub fn stats(&self) -> &ViewportCacheStats {
        &self.stats
    }
}
