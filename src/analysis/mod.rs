//! Analysis Orchestrator (spec §4.10): runs the end-to-end duplication
//! pipeline — detect, probe coverage, enrich impact, rank — with fractional
//! progress reporting at each stage boundary.

mod coverage;
mod impact;

pub use coverage::probe_test_coverage;
pub use impact::{impact_analysis, ImpactAnalysis};

use std::collections::HashSet;
use std::path::PathBuf;

use futures::future::join_all;

use crate::core::context::CoreContext;
use crate::core::errors::{CoreError, Result};
use crate::core::model::RankedCandidate;
use crate::detect::{find_duplication, FindDuplicationRequest};
use crate::executor::{CachingMatcher, Matcher};
use crate::rank::ranker::{BreakingImpact, RankingContext};
use crate::rank::{score_cache::ScoreCache, Ranker};

/// Parameters for one end-to-end duplication-analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// Project root to scan.
    pub project_root: PathBuf,
    /// Target language.
    pub language: String,
    /// Minimum hybrid similarity for a pair to be accepted.
    pub min_similarity: f64,
    /// Minimum construct line count to be considered.
    pub min_lines: usize,
    /// Glob patterns excluded from the file set.
    pub exclude_patterns: Vec<String>,
}

/// Progress reported after each pipeline stage boundary (spec §4.10).
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Fraction complete, in `[0, 1]`.
    pub fraction: f64,
    /// Short label for the stage just completed.
    pub stage: &'static str,
}

/// Lazily-initialized orchestrator: no component is constructed until first use.
pub struct AnalysisOrchestrator<'a> {
    context: &'a CoreContext,
}

impl<'a> AnalysisOrchestrator<'a> {
    /// Build an orchestrator over a shared [`CoreContext`].
    pub fn new(context: &'a CoreContext) -> Self {
        Self { context }
    }

    fn validate(request: &AnalyzeRequest) -> Result<()> {
        if !request.project_root.is_dir() {
            return Err(CoreError::invalid_input(format!(
                "project_root does not exist or is not a directory: {}",
                request.project_root.display()
            )));
        }
        if !(0.0..=1.0).contains(&request.min_similarity) {
            return Err(CoreError::invalid_field(
                "min_similarity must be in [0, 1]",
                "min_similarity",
            ));
        }
        if request.min_lines == 0 {
            return Err(CoreError::invalid_field("min_lines must be positive", "min_lines"));
        }
        Ok(())
    }

    /// Run the full pipeline, invoking `on_progress` at each stage boundary.
    pub async fn analyze(
        &self,
        matcher: &dyn Matcher,
        request: AnalyzeRequest,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<Vec<RankedCandidate>> {
        Self::validate(&request)?;
        on_progress(Progress { fraction: 0.0, stage: "validate" });

        let caching = CachingMatcher::new(matcher, self.context, "analyze_deduplication_candidates");
        let groups = find_duplication(
            &caching,
            self.context,
            FindDuplicationRequest {
                project_root: request.project_root.clone(),
                language: request.language.clone(),
                min_similarity: request.min_similarity,
                min_lines: request.min_lines,
                exclude_patterns: request.exclude_patterns.clone(),
            },
        )
        .await?;
        on_progress(Progress { fraction: 0.50, stage: "detect" });

        if groups.is_empty() {
            on_progress(Progress { fraction: 1.0, stage: "done" });
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = groups
            .iter()
            .flat_map(|g| g.instances.iter().map(|c| c.file.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        files.sort();
        let coverage_by_file = probe_test_coverage(&request.project_root, &files);
        on_progress(Progress { fraction: 0.70, stage: "coverage" });

        let impacts = join_all(groups.iter().map(|g| async { impact_analysis(g) })).await;
        on_progress(Progress { fraction: 0.90, stage: "impact" });

        let score_cache = ScoreCache::new(self.context.config.ranking.cache_size);
        let cache = if self.context.cache_is_disabled() { None } else { Some(&score_cache) };
        let ranker = Ranker::new(self.context.config.ranking, cache);

        let ranked = ranker.rank(groups, |group| {
            let idx = impacts
                .iter()
                .position(|i| i.group_id == group.group_id)
                .expect("every group has a computed impact");
            let impact = &impacts[idx];
            let coverage_percent = group
                .instances
                .iter()
                .filter_map(|c| coverage_by_file.get(&c.file).copied())
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
            RankingContext {
                coverage_percent,
                impact_hint: Some(if impact.cross_file_reference_count > 5 {
                    BreakingImpact::High
                } else if impact.cross_file_reference_count > 0 {
                    BreakingImpact::Medium
                } else {
                    BreakingImpact::Low
                }),
                complexity_present: true,
            }
        });
        on_progress(Progress { fraction: 0.98, stage: "rank" });
        on_progress(Progress { fraction: 1.0, stage: "done" });

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoreConfig;
    use crate::core::model::{Match, Position};
    use crate::executor::scripted::ScriptedMatcher;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_match(file: &std::path::Path, start: usize, end: usize, text: &str) -> Match {
        Match {
            file: file.to_path_buf(),
            start: Position { line: start, column: 1 },
            end: Position { line: end, column: 1 },
            text: text.to_string(),
            meta_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn reports_full_progress_sequence_and_ranks_duplicates() {
        let project = tempdir().unwrap();
        let file = project.path().join("a.py");
        std::fs::write(
            &file,
            "def one():\n    x = 1\n    y = 2\n    return x + y\n\ndef two():\n    x = 1\n    y = 2\n    return x + y\n",
        )
        .unwrap();

        let text = "def f():\n    x = 1\n    y = 2\n    return x + y\n";
        let matcher = ScriptedMatcher::with_matches(vec![
            sample_match(&file, 1, 4, text),
            sample_match(&file, 6, 9, text),
        ]);

        let context = CoreContext::new(CoreConfig::default());
        let orchestrator = AnalysisOrchestrator::new(&context);

        let mut stages = Vec::new();
        let ranked = orchestrator
            .analyze(
                &matcher,
                AnalyzeRequest {
                    project_root: project.path().to_path_buf(),
                    language: "python".into(),
                    min_similarity: 0.5,
                    min_lines: 1,
                    exclude_patterns: Vec::new(),
                },
                |p| stages.push(p.stage),
            )
            .await
            .unwrap();

        assert_eq!(stages, vec!["validate", "detect", "coverage", "impact", "rank", "done"]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, 1);
    }

    #[tokio::test]
    async fn rejects_invalid_project_root() {
        let context = CoreContext::new(CoreConfig::default());
        let orchestrator = AnalysisOrchestrator::new(&context);
        let matcher = ScriptedMatcher::with_matches(vec![]);
        let result = orchestrator
            .analyze(
                &matcher,
                AnalyzeRequest {
                    project_root: PathBuf::from("/does/not/exist/ever"),
                    language: "python".into(),
                    min_similarity: 0.5,
                    min_lines: 1,
                    exclude_patterns: Vec::new(),
                },
                |_| {},
            )
            .await;
        assert!(result.is_err());
    }
}
