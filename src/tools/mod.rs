//! Host-facing tool surface (spec §6): one function per external operation,
//! each a thin orchestration wrapper over the internal components. This is
//! the boundary a CLI or host process calls across.

use std::path::PathBuf;

use crate::analysis::{AnalysisOrchestrator, AnalyzeRequest, Progress};
use crate::backup::{BackupEntry, BackupStore, RestoreReport};
use crate::core::context::CoreContext;
use crate::core::errors::{CoreError, Result};
use crate::core::model::{
    ApplyReport, DuplicateGroup, EnforcementResult, FixBatchResult, RankedCandidate, RefactoringPlan, Severity,
    Violation,
};
use crate::detect::{find_duplication as detect_find_duplication, FindDuplicationRequest};
use crate::executor::{CachingMatcher, Matcher};
use crate::refactor::RefactorOrchestrator;
use crate::rules::{enforce as rules_enforce, EnforceRequest};

/// `find_duplication` (spec §6): list duplicate groups without ranking or enrichment.
pub async fn find_duplication(
    matcher: &dyn Matcher,
    context: &CoreContext,
    project_root: PathBuf,
    language: String,
    min_similarity: Option<f64>,
    min_lines: Option<usize>,
    exclude_patterns: Vec<String>,
) -> Result<Vec<DuplicateGroup>> {
    let caching = CachingMatcher::new(matcher, context, "find_duplication");
    detect_find_duplication(
        &caching,
        context,
        FindDuplicationRequest {
            project_root,
            language,
            min_similarity: min_similarity.unwrap_or(0.8),
            min_lines: min_lines.unwrap_or(5),
            exclude_patterns,
        },
    )
    .await
}

/// Result shape for `analyze_deduplication_candidates` (spec §6).
#[derive(Debug, Clone)]
pub struct DeduplicationAnalysis {
    /// Top `max_candidates` ranked groups.
    pub top_candidates: Vec<RankedCandidate>,
    /// Sum of `lines_saved_estimate` across every group found (not just the top slice).
    pub savings: i64,
    /// Number of groups found before truncation to `max_candidates`.
    pub analysis: usize,
}

/// `analyze_deduplication_candidates` (spec §6): run the full orchestrated
/// pipeline and truncate to the top `max_candidates` by rank.
pub async fn analyze_deduplication_candidates(
    matcher: &dyn Matcher,
    context: &CoreContext,
    project_root: PathBuf,
    language: String,
    min_similarity: Option<f64>,
    min_lines: Option<usize>,
    max_candidates: Option<usize>,
    exclude_patterns: Vec<String>,
    mut on_progress: impl FnMut(Progress),
) -> Result<DeduplicationAnalysis> {
    let orchestrator = AnalysisOrchestrator::new(context);
    let ranked = orchestrator
        .analyze(
            matcher,
            AnalyzeRequest {
                project_root,
                language,
                min_similarity: min_similarity.unwrap_or(0.8),
                min_lines: min_lines.unwrap_or(5),
                exclude_patterns,
            },
            &mut on_progress,
        )
        .await?;

    let total_groups = ranked.len();
    let savings: i64 = ranked.iter().map(|r| r.group.lines_saved_estimate).sum();
    let top_candidates = ranked.into_iter().take(max_candidates.unwrap_or(usize::MAX)).collect();

    Ok(DeduplicationAnalysis {
        top_candidates,
        savings,
        analysis: total_groups,
    })
}

/// `apply_deduplication` (spec §6): apply a [`RefactoringPlan`] directly.
/// Resolving a bare `group_id` into a plan is a host/caller responsibility
/// (it requires a code-generation strategy outside this crate's scope);
/// this function accepts the already-materialized plan.
pub async fn apply_deduplication(
    backups_root: PathBuf,
    plan: &RefactoringPlan,
    project_root: PathBuf,
    dry_run: bool,
    backup: bool,
) -> Result<ApplyReport> {
    let orchestrator = RefactorOrchestrator::new(backups_root);
    orchestrator.apply(plan, &project_root, dry_run, backup)
}

/// `enforce_standards` (spec §6).
pub async fn enforce_standards(
    matcher: &dyn Matcher,
    context: &CoreContext,
    project_root: PathBuf,
    language: String,
    rule_set: Option<String>,
    custom_rules: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
    severity_threshold: Option<Severity>,
    max_violations: Option<usize>,
    parallelism: Option<usize>,
    rule_dir_name: &str,
) -> Result<EnforcementResult> {
    let caching = CachingMatcher::new(matcher, context, "enforce_standards");
    rules_enforce(
        &caching,
        EnforceRequest {
            project_root,
            language,
            rule_set,
            custom_rule_ids: custom_rules,
            include,
            exclude,
            severity_threshold: severity_threshold.unwrap_or(Severity::Info),
            max_violations: max_violations.unwrap_or(0),
            parallelism: parallelism.unwrap_or(4),
        },
        rule_dir_name,
    )
    .await
}

/// Which fix-safety classes `apply_standards_fixes` should apply (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixTypes {
    /// Only `is_safe=true` fixes.
    Safe,
    /// Safe and suggested (`confidence >= 0.7`), but not review-required.
    Suggested,
    /// Every classified fix, including review-required ones.
    All,
}

/// `apply_standards_fixes` (spec §6).
pub fn apply_standards_fixes(
    backups_root: PathBuf,
    violations: &[Violation],
    project_root: PathBuf,
    fix_types: FixTypes,
    dry_run: bool,
    create_backup: bool,
) -> Result<FixBatchResult> {
    let filtered: Vec<Violation> = violations
        .iter()
        .filter(|v| {
            let classification = crate::refactor::classify_fix(&v.rule_id);
            match fix_types {
                FixTypes::Safe => classification.is_safe,
                FixTypes::Suggested => classification.confidence >= 0.7,
                FixTypes::All => true,
            }
        })
        .cloned()
        .collect();

    if dry_run {
        return Ok(FixBatchResult {
            backup_id: None,
            attempted: filtered.len(),
            successful: 0,
            failed: 0,
            files_modified: Vec::new(),
            validation_passed: true,
            results: Vec::new(),
        });
    }

    let orchestrator = RefactorOrchestrator::new(backups_root);
    orchestrator.apply_fixes(&filtered, &project_root, create_backup)
}

/// `rollback_rewrite` (spec §6).
pub fn rollback_rewrite(backups_root: PathBuf, backup_id: &str) -> Result<RestoreReport> {
    let store = BackupStore::new(backups_root);
    store.restore(backup_id)
}

/// `list_backups` (spec §6).
pub fn list_backups(backups_root: PathBuf) -> Result<Vec<BackupEntry>> {
    BackupStore::new(backups_root).list()
}

/// Resolve a `group_id` produced by `find_duplication` to a concrete group,
/// for callers of `apply_deduplication` that only have the id on hand.
pub fn resolve_group<'a>(groups: &'a [DuplicateGroup], group_id: &str) -> Result<&'a DuplicateGroup> {
    groups
        .iter()
        .find(|g| g.group_id == group_id)
        .ok_or_else(|| CoreError::invalid_input(format!("unknown group_id: {group_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Position;
    use std::collections::HashMap;
    use std::path::Path;

    fn violation(rule_id: &str, file: &Path, line: usize, fix: Option<&str>) -> Violation {
        Violation {
            rule_id: rule_id.to_string(),
            severity: Severity::Warning,
            message: "test".into(),
            file: file.to_path_buf(),
            start: Position { line, column: 1 },
            end: Position { line, column: 1 },
            meta_vars: HashMap::new(),
            fix_suggestion: fix.map(String::from),
        }
    }

    #[test]
    fn dry_run_fix_batch_reports_attempted_without_writing() {
        let file = Path::new("/tmp/does-not-matter.js");
        let violations = vec![violation("no-var", file, 1, Some("let x = 1;"))];
        let result = apply_standards_fixes(
            PathBuf::from("/tmp/unused-backups"),
            &violations,
            PathBuf::from("/tmp"),
            FixTypes::Safe,
            true,
            true,
        )
        .unwrap();
        assert_eq!(result.attempted, 1);
        assert_eq!(result.successful, 0);
        assert!(result.files_modified.is_empty());
    }

    #[test]
    fn safe_filter_excludes_review_required_rules() {
        let file = Path::new("/tmp/x.js");
        let violations = vec![
            violation("no-var", file, 1, Some("let x = 1;")),
            violation("eval-removal", file, 2, Some("")),
        ];
        let result = apply_standards_fixes(
            PathBuf::from("/tmp/unused-backups"),
            &violations,
            PathBuf::from("/tmp"),
            FixTypes::Safe,
            true,
            true,
        )
        .unwrap();
        assert_eq!(result.attempted, 1);
    }

    #[test]
    fn resolve_group_rejects_unknown_id() {
        let groups: Vec<DuplicateGroup> = Vec::new();
        assert!(resolve_group(&groups, "missing").is_err());
    }
}
