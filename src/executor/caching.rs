//! [`CachingMatcher`]: decorates any [`Matcher`] with the Query Cache
//! (spec §4.2), memoizing a query's full match list keyed by a fingerprint
//! over its parameters so identical queries within a session skip the
//! subprocess entirely.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{MatchRequest, MatchStream, Matcher};
use crate::cache::query_cache::QueryKey;
use crate::core::context::CoreContext;
use crate::core::errors::Result;

/// Wraps an inner [`Matcher`] so repeat queries are served from
/// [`CoreContext::query_cache`] instead of re-running the subprocess.
/// Respects [`CoreContext::cache_is_disabled`]: when set, every call passes
/// straight through and neither reads nor writes the cache (stats unchanged,
/// per spec §4.2's disable-switch contract).
pub struct CachingMatcher<'a> {
    inner: &'a dyn Matcher,
    context: &'a CoreContext,
    /// Distinguishes callers that would otherwise fingerprint identically
    /// (e.g. `find_duplication` vs `enforce_standards` over the same project).
    operation: &'static str,
}

impl<'a> CachingMatcher<'a> {
    /// Wrap `inner`, memoizing its results in `context`'s query cache.
    pub fn new(inner: &'a dyn Matcher, context: &'a CoreContext, operation: &'static str) -> Self {
        Self { inner, context, operation }
    }
}

#[async_trait]
impl<'a> Matcher for CachingMatcher<'a> {
    async fn run(&self, request: MatchRequest) -> Result<MatchStream> {
        if self.context.cache_is_disabled() {
            return self.inner.run(request).await;
        }

        let key = QueryKey::fingerprint(
            self.operation,
            &request.project_root,
            &request.pattern_or_rule_yaml,
            &request.language,
            &[],
        );
        if let Some(cached) = self.context.query_cache.get(&key) {
            return Ok(MatchStream::Scripted(VecDeque::from(cached)));
        }

        let mut stream = self.inner.run(request).await?;
        let mut matches = Vec::new();
        while let Some(m) = stream.next().await? {
            matches.push(m);
        }
        self.context.query_cache.put(key, matches.clone());
        Ok(MatchStream::Scripted(VecDeque::from(matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoreConfig;
    use crate::core::model::{Match, Position};
    use crate::executor::scripted::ScriptedMatcher;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn request() -> MatchRequest {
        MatchRequest {
            project_root: Path::new(".").to_path_buf(),
            pattern_or_rule_yaml: "id: x\nlanguage: python\nrule:\n  pattern: foo".into(),
            language: "python".into(),
            max_results: None,
            timeout: Duration::from_secs(5),
            workers: None,
        }
    }

    fn sample_match() -> Match {
        Match {
            file: PathBuf::from("a.py"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 2 },
            text: "x".into(),
            meta_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn second_identical_query_is_served_from_cache() {
        let inner = ScriptedMatcher::with_matches(vec![sample_match()]);
        let context = CoreContext::new(CoreConfig::default());
        let caching = CachingMatcher::new(&inner, &context, "find_duplication");

        let mut first = caching.run(request()).await.unwrap();
        while first.next().await.unwrap().is_some() {}
        let mut second = caching.run(request()).await.unwrap();
        while second.next().await.unwrap().is_some() {}

        assert_eq!(inner.requests_seen().len(), 1);
        let stats = context.query_cache.stats();
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn disabled_cache_always_calls_through() {
        let inner = ScriptedMatcher::with_matches(vec![sample_match()]);
        let context = CoreContext::new(CoreConfig::default());
        context.disable_cache();
        let caching = CachingMatcher::new(&inner, &context, "find_duplication");

        let mut first = caching.run(request()).await.unwrap();
        while first.next().await.unwrap().is_some() {}
        let mut second = caching.run(request()).await.unwrap();
        while second.next().await.unwrap().is_some() {}

        assert_eq!(inner.requests_seen().len(), 2);
        assert_eq!(context.query_cache.stats(), crate::cache::query_cache::CacheStats::default());
    }
}
