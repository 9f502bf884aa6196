//! Query Cache (spec §4.2): memoizes match lists keyed by a blake3
//! fingerprint over the query parameters. LRU-bounded with per-entry TTL,
//! safe under concurrent readers/writers, and bypassable via a disable
//! switch owned by [`crate::core::context::CoreContext`].

use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::core::model::Match;

/// Stable fingerprint over the parameters that determine a query's result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey(pub [u8; 32]);

impl QueryKey {
    /// Fingerprint `(operation, canonicalized project root, pattern/rule
    /// text, language, filters)` exactly as spec §4.2 requires — two calls
    /// with the same logical query always hash to the same key.
    pub fn fingerprint(
        operation: &str,
        project_root: &std::path::Path,
        pattern_or_rule: &str,
        language: &str,
        filters: &[&str],
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(operation.as_bytes());
        hasher.update(b"\0");
        hasher.update(project_root.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(pattern_or_rule.as_bytes());
        hasher.update(b"\0");
        hasher.update(language.as_bytes());
        for f in filters {
            hasher.update(b"\0");
            hasher.update(f.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }
}

/// Snapshot of cache hit/miss/size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing (or a stale entry).
    pub misses: u64,
    /// Entries currently resident.
    pub size: usize,
}

struct Entry {
    value: Vec<Match>,
    inserted_at: Instant,
}

struct Inner {
    lru: LruCache<QueryKey, Entry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

/// Thread-safe match-list cache with LRU eviction and TTL expiry.
pub struct QueryCache {
    inner: Mutex<Inner>,
}

impl QueryCache {
    /// Build a cache holding at most `max_size` entries, each valid for
    /// `ttl_seconds` after insertion.
    pub fn new(max_size: usize, ttl_seconds: u64) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_size.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(capacity),
                ttl: Duration::from_secs(ttl_seconds),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Look up `key`; an expired entry is treated as a miss and removed.
    pub fn get(&self, key: &QueryKey) -> Option<Vec<Match>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let hit = match inner.lru.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= ttl => Some(entry.value.clone()),
            Some(_) => None,
            None => None,
        };
        match hit {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.lru.pop(key);
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: QueryKey, value: Vec<Match>) {
        let mut inner = self.inner.lock();
        inner.lru.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop all entries and reset hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Current hit/miss/size counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.lru.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Position;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn sample_match() -> Match {
        Match {
            file: PathBuf::from("a.py"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 2 },
            text: "x".into(),
            meta_vars: HashMap::new(),
        }
    }

    #[test]
    fn identical_queries_fingerprint_equal() {
        let a = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "python", &[]);
        let b = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "python", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_language_changes_fingerprint() {
        let a = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "python", &[]);
        let b = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "js", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn hit_then_miss_after_clear() {
        let cache = QueryCache::new(4, 300);
        let key = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "python", &[]);
        assert!(cache.get(&key).is_none());
        cache.put(key, vec![sample_match()]);
        assert!(cache.get(&key).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        cache.clear();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let cache = QueryCache::new(4, 0);
        let key = QueryKey::fingerprint("find", Path::new("/proj"), "pattern: x", "python", &[]);
        cache.put(key, vec![sample_match()]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn lru_evicts_oldest_beyond_capacity() {
        let cache = QueryCache::new(1, 300);
        let k1 = QueryKey::fingerprint("find", Path::new("/proj"), "a", "python", &[]);
        let k2 = QueryKey::fingerprint("find", Path::new("/proj"), "b", "python", &[]);
        cache.put(k1, vec![sample_match()]);
        cache.put(k2, vec![sample_match()]);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
    }
}
