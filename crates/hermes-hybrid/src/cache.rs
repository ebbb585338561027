//! Exact-match memo of final search results.
//!
//! Keys are fingerprints of the normalized query plus every parameter that
//! changes the answer. Entries expire after a ttl; there is no invalidation
//! on ingest or delete, so a cached answer may lag behind the store until it
//! expires or the cache is cleared.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hermes_core::types::{Filters, RankedResult};
use hermes_core::Result;

/// Deterministic cache key (blake3 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(query: &str, top_k: usize, filters: &Filters, use_reranker: bool) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize_query(query).as_bytes());
        hasher.update(&(top_k as u64).to_le_bytes());
        // length-prefixed so adjacent optional fields cannot collide
        for field in [&filters.doc_type, &filters.source] {
            match field {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&(v.len() as u64).to_le_bytes());
                    hasher.update(v.as_bytes());
                }
                None => { hasher.update(&[0]); }
            }
        }
        hasher.update(&[use_reranker as u8]);
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

/// Lowercased, whitespace collapsed and trimmed.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

/// A memoized answer: the final results plus the fused candidate count they
/// were cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSearch {
    pub results: Vec<RankedResult>,
    pub total_candidates: usize,
}

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &Fingerprint) -> Result<Option<CachedSearch>>;
    fn put(&self, key: &Fingerprint, search: &CachedSearch, ttl: Duration) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

struct Entry {
    search: CachedSearch,
    /// `None` when the ttl reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process LRU with per-entry ttl.
pub struct LruResultCache {
    inner: Mutex<LruCache<Fingerprint, Entry>>,
    stats: CacheStats,
}

impl LruResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats { &self.stats }
    pub fn len(&self) -> usize { self.inner.lock().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl ResultCache for LruResultCache {
    fn get(&self, key: &Fingerprint) -> Result<Option<CachedSearch>> {
        let mut cache = self.inner.lock();
        let now = Instant::now();
        let lookup = cache.get(key).map(|e| e.is_fresh(now).then(|| e.search.clone()));
        let fresh = match lookup {
            Some(Some(results)) => Some(results),
            Some(None) => {
                cache.pop(key);
                None
            }
            None => None,
        };
        let counter = if fresh.is_some() { &self.stats.hits } else { &self.stats.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(fresh)
    }

    fn put(&self, key: &Fingerprint, search: &CachedSearch, ttl: Duration) -> Result<()> {
        let mut cache = self.inner.lock();
        // Only count eviction if full AND key doesn't already exist
        if cache.len() == cache.cap().get() && !cache.contains(key) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        let expires_at = Instant::now().checked_add(ttl);
        cache.put(key.clone(), Entry { search: search.clone(), expires_at });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.inner.lock().clear();
        Ok(())
    }
}
