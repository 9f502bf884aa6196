//! Ranker score cache (spec §4.6): memoizes `total_score`/`component_scores`
//! by a fingerprint over `(group signature, coverage bucket, impact hint,
//! complexity value)`.

use lru::LruCache;
use parking_lot::Mutex;

use crate::core::model::ComponentScores;

/// Fingerprint over the inputs that determine a group's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreKey(u64);

impl ScoreKey {
    /// Build a key from the group id, a coarse coverage bucket (0-10), an
    /// impact-hint discriminant, and the complexity value bit pattern.
    pub fn new(group_id: &str, coverage_bucket: u8, impact_hint: &str, complexity: f64) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        group_id.hash(&mut hasher);
        coverage_bucket.hash(&mut hasher);
        impact_hint.hash(&mut hasher);
        complexity.to_bits().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Cached score result, mirroring [`crate::core::model::RankedCandidate`]'s
/// scoring fields without the group payload.
#[derive(Debug, Clone, Copy)]
pub struct CachedScore {
    /// The four weighted components.
    pub component_scores: ComponentScores,
    /// `round(Σ component_scores, 2)`.
    pub total_score: f64,
}

/// Snapshot of hit/miss/size counters, mirroring the Query Cache's shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries currently resident.
    pub size: usize,
}

struct Inner {
    lru: LruCache<ScoreKey, CachedScore>,
    hits: u64,
    misses: u64,
}

/// Thread-safe LRU cache of ranker scores.
pub struct ScoreCache {
    inner: Mutex<Inner>,
}

impl ScoreCache {
    /// Build a cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_size.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Look up a cached score for `key`.
    pub fn get(&self, key: &ScoreKey) -> Option<CachedScore> {
        let mut inner = self.inner.lock();
        match inner.lru.get(key).copied() {
            Some(score) => {
                inner.hits += 1;
                Some(score)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace the cached score for `key`.
    pub fn put(&self, key: ScoreKey, score: CachedScore) {
        self.inner.lock().lru.put(key, score);
    }

    /// Current hit/miss/size counters.
    pub fn stats(&self) -> ScoreCacheStats {
        let inner = self.inner.lock();
        ScoreCacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.lru.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_fingerprint_equal() {
        let a = ScoreKey::new("g1", 5, "low", 12.5);
        let b = ScoreKey::new("g1", 5, "low", 12.5);
        assert_eq!(a, b);
    }

    #[test]
    fn put_then_get_hits() {
        let cache = ScoreCache::new(4);
        let key = ScoreKey::new("g1", 5, "low", 12.5);
        assert!(cache.get(&key).is_none());
        cache.put(
            key,
            CachedScore {
                component_scores: ComponentScores::default(),
                total_score: 0.0,
            },
        );
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.stats().hits, 1);
    }
}
