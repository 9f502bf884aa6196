//! Ranker (spec §4.6): fixed-formula scoring and priority classification
//! over [`DuplicateGroup`]s.

use crate::core::config::RankingConfig;
use crate::core::model::{ComponentScores, DuplicateGroup, Priority, RankedCandidate};
use crate::rank::score_cache::{CachedScore, ScoreCache, ScoreKey};

/// External hint about how risky it would be to deduplicate a group
/// (spec §4.6); absent hints default to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakingImpact {
    /// Low risk of behavior change.
    Low,
    /// Unknown / moderate risk (the default absent an explicit hint).
    Medium,
    /// High risk of behavior change.
    High,
}

impl BreakingImpact {
    fn multiplier(self) -> f64 {
        match self {
            BreakingImpact::Low => 1.0,
            BreakingImpact::Medium => 0.7,
            BreakingImpact::High => 0.3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BreakingImpact::Low => "low",
            BreakingImpact::Medium => "medium",
            BreakingImpact::High => "high",
        }
    }
}

/// Extra per-group inputs the Ranker needs beyond the group itself.
#[derive(Debug, Clone, Copy)]
pub struct RankingContext {
    /// Test coverage percentage for the group's files, if known.
    pub coverage_percent: Option<f64>,
    /// External impact-analysis hint; `None` defaults to `Medium`.
    pub impact_hint: Option<BreakingImpact>,
    /// Whether `group.complexity_score` came from a real complexity calculator.
    pub complexity_present: bool,
}

impl Default for RankingContext {
    fn default() -> Self {
        Self {
            coverage_percent: None,
            impact_hint: None,
            complexity_present: true,
        }
    }
}

/// Scores and classifies [`DuplicateGroup`]s using the fixed formula in
/// spec §4.6 / invariant 3. Stateless apart from the shared score cache.
pub struct Ranker<'a> {
    config: RankingConfig,
    cache: Option<&'a ScoreCache>,
}

impl<'a> Ranker<'a> {
    /// Build a ranker with the given weights, optionally backed by a
    /// shared score cache.
    pub fn new(config: RankingConfig, cache: Option<&'a ScoreCache>) -> Self {
        Self { config, cache }
    }

    fn component_scores(&self, group: &DuplicateGroup, ctx: &RankingContext) -> ComponentScores {
        let savings = (group.lines_saved_estimate as f64 / 5.0).min(100.0) * self.config.weight_savings;

        let complexity = if ctx.complexity_present {
            (100.0 - (group.complexity_score - 1.0) * 16.67).max(0.0)
        } else {
            50.0
        } * self.config.weight_complexity;

        let coverage = ctx.coverage_percent.unwrap_or(50.0);
        let multiplier = ctx.impact_hint.unwrap_or(BreakingImpact::Medium).multiplier();
        let risk = (coverage * multiplier).clamp(0.0, 100.0) * self.config.weight_risk;

        let instance_count = group.instances.len();
        let file_count = group
            .instances
            .iter()
            .map(|c| &c.file)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let effort =
            (100.0 - (instance_count as f64 * 5.0 + file_count as f64 * 10.0)).max(0.0) * self.config.weight_effort;

        ComponentScores {
            savings,
            complexity,
            risk,
            effort,
        }
    }

    /// Score a single group, consulting (and populating) the cache if present.
    pub fn score(&self, group: &DuplicateGroup, ctx: RankingContext) -> (ComponentScores, f64) {
        let coverage_bucket = (ctx.coverage_percent.unwrap_or(50.0) / 10.0).floor() as u8;
        let impact_label = ctx.impact_hint.unwrap_or(BreakingImpact::Medium).label();
        let key = ScoreKey::new(
            &group.group_id,
            coverage_bucket,
            impact_label,
            group.complexity_score,
        );

        if let Some(cache) = self.cache {
            if let Some(cached) = cache.get(&key) {
                return (cached.component_scores, cached.total_score);
            }
        }

        let component_scores = self.component_scores(group, &ctx);
        let total_score = component_scores.total();

        if let Some(cache) = self.cache {
            cache.put(
                key,
                CachedScore {
                    component_scores,
                    total_score,
                },
            );
        }
        (component_scores, total_score)
    }

    /// Score and rank every group, descending by `total_score` with a
    /// stable tie-break on `group_id` (spec §4.6).
    pub fn rank(&self, groups: Vec<DuplicateGroup>, ctx_for: impl Fn(&DuplicateGroup) -> RankingContext) -> Vec<RankedCandidate> {
        let mut scored: Vec<(DuplicateGroup, ComponentScores, f64)> = groups
            .into_iter()
            .map(|g| {
                let ctx = ctx_for(&g);
                let (components, total) = self.score(&g, ctx);
                (g, components, total)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.group_id.cmp(&b.0.group_id))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(idx, (group, component_scores, total_score))| RankedCandidate {
                group,
                total_score,
                component_scores,
                priority: Priority::from_score(total_score),
                rank: idx + 1,
                recommendation: None,
                test_coverage: None,
            })
            .collect()
    }
}
