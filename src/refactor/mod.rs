//! Refactor Orchestrator (spec §4.8): apply a [`RefactoringPlan`] atomically
//! across one or more files, with backup-and-rollback, or apply a batch of
//! rule-driven fixes with file-local atomicity.

mod safety;
mod validate;

pub use safety::{classify_fix, FIX_SAFETY_TABLE};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::backup::BackupStore;
use crate::core::errors::{CoreError, Result};
use crate::core::model::{ApplyReport, FileDiff, FixBatchResult, FixResult, RefactoringPlan, Violation};

/// Applies [`RefactoringPlan`]s and rule-driven fix batches against a project tree.
pub struct RefactorOrchestrator {
    backups: BackupStore,
}

impl RefactorOrchestrator {
    /// Build an orchestrator backed by a [`BackupStore`] rooted at `backups_root`.
    pub fn new(backups_root: impl Into<PathBuf>) -> Self {
        Self {
            backups: BackupStore::new(backups_root),
        }
    }

    fn pre_validate(plan: &RefactoringPlan, project_root: &Path) -> Result<()> {
        if plan.strategy.is_empty() {
            return Err(CoreError::invalid_field("plan.strategy is required", "strategy"));
        }
        if plan.files_affected.is_empty() {
            return Err(CoreError::invalid_field(
                "plan.files_affected must be non-empty",
                "files_affected",
            ));
        }
        for file in &plan.files_affected {
            let absolute = project_root.join(file);
            if !absolute.exists() {
                return Err(CoreError::invalid_input(format!(
                    "plan references a file that does not exist: {}",
                    absolute.display()
                )));
            }
        }
        for (path, replacement) in &plan.replacements {
            validate::validate_content(&plan.language, path, &replacement.new_content)?;
        }
        if let (Some(extract_to), Some(extracted)) = (&plan.extract_to_file, &plan.extracted_function) {
            validate::validate_content(&plan.language, extract_to, extracted)?;
        }
        Ok(())
    }

    /// Apply `plan` against `project_root`. With `dry_run`, computes the
    /// intended diffs without touching disk. With `create_backup`, every
    /// touched file is snapshotted before the first write.
    pub fn apply(
        &self,
        plan: &RefactoringPlan,
        project_root: &Path,
        dry_run: bool,
        create_backup: bool,
    ) -> Result<ApplyReport> {
        Self::pre_validate(plan, project_root)?;

        let mut diffs = Vec::new();
        if let (Some(extract_to), Some(extracted)) = (&plan.extract_to_file, &plan.extracted_function) {
            let absolute = project_root.join(extract_to);
            let before = std::fs::read_to_string(&absolute).ok();
            let after = match &before {
                Some(existing) => format!("{existing}\n{extracted}"),
                None => extracted.clone(),
            };
            diffs.push(FileDiff {
                path: extract_to.clone(),
                before,
                after,
            });
        }
        for file in &plan.files_affected {
            let absolute = project_root.join(file);
            let before = std::fs::read_to_string(&absolute).ok();
            let mut after = plan
                .replacements
                .get(file)
                .map(|r| r.new_content.clone())
                .unwrap_or_else(|| before.clone().unwrap_or_default());
            if let Some(extract_to) = &plan.extract_to_file {
                after = inject_import_idempotent(&after, &plan.language, extract_to);
            }
            diffs.push(FileDiff {
                path: file.clone(),
                before,
                after,
            });
        }

        if dry_run {
            return Ok(ApplyReport {
                files_modified: Vec::new(),
                backup_id: None,
                diffs,
                validation_passed: true,
            });
        }

        let to_snapshot: Vec<PathBuf> = plan
            .files_affected
            .iter()
            .map(|f| project_root.join(f))
            .filter(|p| p.exists())
            .collect();
        let backup_id = if create_backup && !to_snapshot.is_empty() {
            Some(self.backups.create(&to_snapshot, project_root, "apply_deduplication")?)
        } else {
            None
        };

        let mut written = Vec::new();
        let write_result = self.write_plan_diffs(project_root, &diffs, plan, &mut written);

        match write_result {
            Ok(()) => {
                info!(files = written.len(), strategy = %plan.strategy, "refactor plan applied");
                Ok(ApplyReport {
                    files_modified: written,
                    backup_id,
                    diffs,
                    validation_passed: true,
                })
            }
            Err(e) => {
                warn!(error = %e, "refactor plan failed, rolling back");
                if let Some(ref id) = backup_id {
                    let restore = self.backups.restore(id)?;
                    if !restore.errors.is_empty() {
                        warn!(errors = ?restore.errors, "rollback encountered errors");
                    }
                }
                Ok(ApplyReport {
                    files_modified: Vec::new(),
                    backup_id,
                    diffs,
                    validation_passed: false,
                })
            }
        }
    }

    fn write_plan_diffs(
        &self,
        project_root: &Path,
        diffs: &[FileDiff],
        plan: &RefactoringPlan,
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for diff in diffs {
            let absolute = project_root.join(&diff.path);
            if let Some(parent) = absolute.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&absolute, &diff.after)?;
            written.push(diff.path.clone());
            validate::validate_content(&plan.language, &diff.path, &diff.after)?;
            if Some(&diff.path) == plan.extract_to_file.as_ref() {
                if let Some(name) = extracted_function_name(&plan.language, plan.extracted_function.as_deref()) {
                    if !diff.after.contains(&name) {
                        return Err(CoreError::validation(
                            diff.path.display().to_string(),
                            format!("extracted function `{name}` not found in extract target"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply fixes for `violations` to `project_root`, grouped by file and
    /// applied in descending line order so earlier edits don't shift later
    /// ones. Atomicity is file-local: a failing fix rolls back only its file.
    pub fn apply_fixes(
        &self,
        violations: &[Violation],
        project_root: &Path,
        create_backup: bool,
    ) -> Result<FixBatchResult> {
        let mut by_file: HashMap<PathBuf, Vec<&Violation>> = HashMap::new();
        for v in violations {
            by_file.entry(v.file.clone()).or_default().push(v);
        }

        let mut result = FixBatchResult::default();
        let backup_id = if create_backup && !by_file.is_empty() {
            let files: Vec<PathBuf> = by_file.keys().map(|f| project_root.join(f)).filter(|p| p.exists()).collect();
            if files.is_empty() {
                None
            } else {
                Some(self.backups.create(&files, project_root, "enforce_fix")?)
            }
        } else {
            None
        };
        result.backup_id = backup_id.clone();

        for (file, mut file_violations) in by_file {
            file_violations.sort_by(|a, b| b.start.line.cmp(&a.start.line));
            let absolute = project_root.join(&file);
            let original = match std::fs::read_to_string(&absolute) {
                Ok(c) => c,
                Err(e) => {
                    for v in &file_violations {
                        result.attempted += 1;
                        result.failed += 1;
                        result.results.push(failed_fix_result(&file, v, e.to_string()));
                    }
                    continue;
                }
            };

            let had_trailing_newline = original.ends_with('\n');
            let mut lines: Vec<String> = original.lines().map(|l| l.to_string()).collect();
            let mut file_ok = true;
            let mut file_results = Vec::new();

            for v in &file_violations {
                result.attempted += 1;
                let Some(fix) = v.fix_suggestion.as_ref() else {
                    result.failed += 1;
                    file_ok = false;
                    file_results.push(failed_fix_result(&file, v, "no fix available for this violation".into()));
                    continue;
                };
                let idx = v.start.line.saturating_sub(1);
                let Some(line) = lines.get(idx).cloned() else {
                    result.failed += 1;
                    file_ok = false;
                    file_results.push(failed_fix_result(&file, v, "violation line out of range".into()));
                    continue;
                };
                lines[idx] = fix.clone();
                let kind = classify_fix(&v.rule_id).kind;
                file_results.push(FixResult {
                    file: file.clone(),
                    original_text: line,
                    fixed_text: fix.clone(),
                    success: true,
                    syntax_valid: true,
                    error: None,
                    fix_kind: kind,
                });
            }

            if file_ok {
                let mut new_content = lines.join("\n");
                if had_trailing_newline {
                    new_content.push('\n');
                }
                match std::fs::write(&absolute, &new_content) {
                    Ok(()) => {
                        result.successful += file_results.len();
                        result.files_modified.push(file.clone());
                        result.results.extend(file_results);
                    }
                    Err(e) => {
                        result.failed += file_results.len();
                        for r in &mut file_results {
                            r.success = false;
                            r.syntax_valid = false;
                            r.error = Some(e.to_string());
                        }
                        result.results.extend(file_results);
                        if let Some(ref id) = backup_id {
                            let _ = self.restore_single_file(id, &absolute);
                        }
                    }
                }
            } else {
                result.results.extend(file_results);
            }
        }

        result.validation_passed = result.failed == 0;
        Ok(result)
    }

    fn restore_single_file(&self, backup_id: &str, absolute: &Path) -> Result<()> {
        let report = self.backups.restore_file(backup_id, absolute)?;
        if !report.errors.is_empty() {
            warn!(errors = ?report.errors, "file-local rollback encountered errors");
        }
        Ok(())
    }
}

fn failed_fix_result(file: &Path, v: &Violation, error: String) -> FixResult {
    FixResult {
        file: file.to_path_buf(),
        original_text: String::new(),
        fixed_text: String::new(),
        success: false,
        syntax_valid: false,
        error: Some(error),
        fix_kind: classify_fix(&v.rule_id).kind,
    }
}

fn extracted_function_name(language: &str, extracted: Option<&str>) -> Option<String> {
    let source = extracted?;
    if language == "python" {
        source
            .lines()
            .find_map(|l| l.trim_start().strip_prefix("def ").map(|rest| rest.split('(').next().unwrap_or("").to_string()))
    } else {
        source.lines().find_map(|l| {
            let trimmed = l.trim_start();
            for prefix in ["function ", "export function "] {
                if let Some(rest) = trimmed.strip_prefix(prefix) {
                    return Some(rest.split('(').next().unwrap_or("").trim().to_string());
                }
            }
            None
        })
    }
}

fn inject_import_idempotent(content: &str, language: &str, extract_to: &Path) -> String {
    let module = extract_to.file_stem().and_then(|s| s.to_str()).unwrap_or("extracted");
    let import_line = match language {
        "python" => format!("from .{module} import *"),
        "javascript" | "typescript" => format!("import * as {module} from './{module}';"),
        _ => return content.to_string(),
    };
    if content.contains(&import_line) {
        content.to_string()
    } else {
        format!("{import_line}\n{content}")
    }
}
