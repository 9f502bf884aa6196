//! `CoreContext`: the process-wide home for shared caches and the
//! cache-disable switch (spec §9 "Global mutable state").
//!
//! Every component that would otherwise reach for a global static takes a
//! `&CoreContext` (or an `Arc<CoreContext>`) in its constructor instead, the
//! way the teacher crate threads `Arc<AstService>` through its detectors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::query_cache::QueryCache;
use crate::core::config::CoreConfig;
use crate::rank::score_cache::ScoreCache;
use crate::similarity::signature_cache::SignatureCache;

/// Shared, process-wide state: the three bounded caches plus the
/// cache-disable flag that makes every one of them behave as if absent.
pub struct CoreContext {
    /// Config this context was built from.
    pub config: CoreConfig,
    /// Match-list cache keyed by query fingerprint.
    pub query_cache: QueryCache,
    /// MinHash signature cache keyed by `(construct_id, num_perm)`.
    pub signature_cache: SignatureCache,
    /// Ranker score cache keyed by group/coverage/impact/complexity fingerprint.
    pub score_cache: ScoreCache,
    cache_disabled: AtomicBool,
}

impl CoreContext {
    /// Build a context from the given configuration.
    pub fn new(config: CoreConfig) -> Arc<Self> {
        let query_cache = QueryCache::new(config.cache.max_size, config.cache.ttl_seconds);
        let signature_cache = SignatureCache::new(config.cache.max_size);
        let score_cache = ScoreCache::new(config.ranking.cache_size);
        Arc::new(Self {
            config,
            query_cache,
            signature_cache,
            score_cache,
            cache_disabled: AtomicBool::new(false),
        })
    }

    /// Build a context with default configuration.
    pub fn default_context() -> Arc<Self> {
        Self::new(CoreConfig::default())
    }

    /// Process-global bypass: when set, all three caches behave as absent
    /// (operations execute as if the cache doesn't exist; stats unchanged).
    pub fn disable_cache(&self) {
        self.cache_disabled.store(true, Ordering::SeqCst);
    }

    /// Re-enable the caches after [`Self::disable_cache`].
    pub fn enable_cache(&self) {
        self.cache_disabled.store(false, Ordering::SeqCst);
    }

    /// Whether the cache-disable switch is currently set.
    pub fn cache_is_disabled(&self) -> bool {
        self.cache_disabled.load(Ordering::SeqCst) || !self.config.cache.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_switch_round_trips() {
        let ctx = CoreContext::default_context();
        assert!(!ctx.cache_is_disabled());
        ctx.disable_cache();
        assert!(ctx.cache_is_disabled());
        ctx.enable_cache();
        assert!(!ctx.cache_is_disabled());
    }
}
