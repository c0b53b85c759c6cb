//! In-memory LRU cache for encoded tiles.
//!
//! Bounded by an approximate byte budget rather than an entry count, since
//! tile payloads vary a lot between empty-ocean and dense-overlay tiles.
//! Entries are immutable byte blobs; the only mutation is insertion,
//! eviction, and the bulk flush on overlay replacement.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use overlay_common::TileCoord;

// The LruCache needs an entry bound, but eviction here is byte-driven.
// At a few KB per encoded tile this is far beyond any realistic budget.
const LRU_CAPACITY: usize = 1_000_000;

pub struct TileCache {
    cache: Mutex<CacheInner>,
    max_bytes: usize,
    stats: TileCacheStats,
}

struct CacheInner {
    entries: LruCache<TileCoord, Bytes>,
    size_bytes: usize,
}

/// Counters are atomics so a metrics reader never takes the cache lock.
#[derive(Default)]
struct TileCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub size_bytes: usize,
    pub entry_count: usize,
}

impl TileCache {
    /// Create a cache bounded by `max_bytes` of encoded tile payload.
    pub fn new(max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(LRU_CAPACITY).expect("capacity must be > 0");
        Self {
            cache: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                size_bytes: 0,
            }),
            max_bytes,
            stats: TileCacheStats::default(),
        }
    }

    pub fn get(&self, key: &TileCoord) -> Option<Bytes> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(data) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(data.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: TileCoord, data: Bytes) {
        let mut inner = self.lock();

        let replaced_len = inner.entries.peek(&key).map(Bytes::len);
        if let Some(len) = replaced_len {
            inner.size_bytes -= len;
        }
        inner.size_bytes += data.len();
        inner.entries.put(key, data);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);

        // Evict in LRU order until back under budget.
        while inner.size_bytes > self.max_bytes {
            let Some((evicted_key, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.size_bytes -= evicted.len();
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted_key.cache_key(), "evicted tile over byte budget");
        }
    }

    /// Drop every cached tile. Called when the active overlay changes,
    /// since cached bytes carry no version tag.
    pub fn invalidate_all(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.size_bytes = 0;
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            insertions: self.stats.insertions.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            size_bytes: inner.size_bytes,
            entry_count: inner.entries.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A poisoned lock means a panic while holding it; the inner state
        // is still structurally valid (worst case a stale size counter).
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
