//! MinHash signature cache, keyed by `(construct_id, num_perm)` (spec §3).

use lru::LruCache;
use parking_lot::Mutex;

use super::minhash::MinHashSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SignatureKey {
    construct_id_hash: u64,
    num_perm: usize,
}

impl SignatureKey {
    fn new(construct_id: &str, num_perm: usize) -> Self {
        Self {
            construct_id_hash: seahash(construct_id),
            num_perm,
        }
    }
}

fn seahash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Bounded LRU cache from `(construct_id, num_perm)` to a computed signature.
pub struct SignatureCache {
    inner: Mutex<LruCache<SignatureKey, MinHashSignature>>,
}

impl SignatureCache {
    /// Build a cache holding at most `max_size` signatures.
    pub fn new(max_size: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_size.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a cached signature, if present.
    pub fn get(&self, construct_id: &str, num_perm: usize) -> Option<MinHashSignature> {
        self.inner
            .lock()
            .get(&SignatureKey::new(construct_id, num_perm))
            .cloned()
    }

    /// Insert (or replace) the signature for `(construct_id, num_perm)`.
    pub fn put(&self, construct_id: &str, num_perm: usize, signature: MinHashSignature) {
        self.inner
            .lock()
            .put(SignatureKey::new(construct_id, num_perm), signature);
    }

    /// Number of entries currently resident.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
