//! Rule Engine (spec §4.7): resolves a rule set, executes each rule across
//! a worker pool, and produces a grouped [`EnforcementResult`].

mod builtin;
mod loader;

pub use builtin::{built_in_rule_set, BUILT_IN_SET_NAMES};
pub use loader::load_custom_rules;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::core::errors::{CoreError, Result};
use crate::core::model::{EnforcementResult, Rule, Severity, Violation};
use crate::executor::{MatchRequest, Matcher};
use crate::gate::{eligible_files, GateRequest};

/// Parameters for one enforcement run (spec §4.7).
#[derive(Debug, Clone)]
pub struct EnforceRequest {
    /// Project root to scan.
    pub project_root: PathBuf,
    /// Target language filter; rules for other languages are skipped.
    pub language: String,
    /// Named built-in set, or `None` to use only `custom_rule_ids`/the project's rule directory.
    pub rule_set: Option<String>,
    /// Specific custom rule ids to include (loaded from the project's rule directory).
    pub custom_rule_ids: Vec<String>,
    /// Include globs forwarded to the File Gate.
    pub include: Vec<String>,
    /// Exclude globs forwarded to the File Gate.
    pub exclude: Vec<String>,
    /// Minimum severity to retain in the final result.
    pub severity_threshold: Severity,
    /// Stop accumulating once this many violations are recorded (0 = unlimited).
    pub max_violations: usize,
    /// Worker pool size; `0` falls back to the configured default.
    pub parallelism: usize,
}

fn severity_rank(s: Severity) -> u8 {
    match s {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Error => 2,
    }
}

/// Resolve the effective rule list: named built-in set(s) merged with
/// custom rules loaded from the project's rule directory, higher-priority
/// set winning on id collision (spec §3 invariant 6, §4.7 step 1).
fn resolve_rules(request: &EnforceRequest, rule_dir_name: &str) -> Result<Vec<Rule>> {
    let mut by_id: HashMap<String, (i32, Rule)> = HashMap::new();

    let mut insert_set = |priority: i32, rules: Vec<Rule>| {
        for rule in rules {
            match by_id.get(&rule.id) {
                Some((existing_priority, _)) if *existing_priority >= priority => {}
                _ => {
                    by_id.insert(rule.id.clone(), (priority, rule));
                }
            }
        }
    };

    match request.rule_set.as_deref() {
        Some("all") => {
            for (idx, name) in BUILT_IN_SET_NAMES.iter().enumerate() {
                insert_set(idx as i32, built_in_rule_set(name).rules);
            }
        }
        Some(name) if BUILT_IN_SET_NAMES.contains(&name) => {
            insert_set(0, built_in_rule_set(name).rules);
        }
        Some("custom") | None => {}
        Some(other) => {
            return Err(CoreError::invalid_field(
                format!("unknown rule_set `{other}`"),
                "rule_set",
            ));
        }
    }

    let custom_dir = request.project_root.join(rule_dir_name);
    if custom_dir.is_dir() {
        let custom_rules = load_custom_rules(&custom_dir)?;
        insert_set(100, custom_rules);
    }

    if !request.custom_rule_ids.is_empty() {
        by_id.retain(|id, _| request.custom_rule_ids.contains(id));
    }

    let mut rules: Vec<Rule> = by_id
        .into_values()
        .filter(|(_, r)| r.language == request.language)
        .map(|(_, r)| r)
        .collect();
    rules.sort_by(|a, b| a.id.cmp(&b.id));

    if rules.is_empty() {
        return Err(CoreError::invalid_input(
            "no rules resolved for the requested rule_set/custom_rule_ids/language",
        ));
    }
    Ok(rules)
}

/// Wire shape for one rule document: the match body nested under `rule:`,
/// everything else (id, language, severity, message, fix) at the top level,
/// matching the matcher's native rule config rather than [`Rule`]'s flat
/// on-disk/built-in storage shape.
#[derive(Serialize)]
struct WireRuleBody<'a> {
    pattern: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
struct WireRule<'a> {
    id: &'a str,
    language: &'a str,
    rule: WireRuleBody<'a>,
    severity: Severity,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

fn rule_to_wire_yaml(rule: &Rule) -> std::result::Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&WireRule {
        id: &rule.id,
        language: &rule.language,
        rule: WireRuleBody {
            pattern: &rule.pattern,
            constraints: rule.constraints.as_ref(),
        },
        severity: rule.severity,
        message: &rule.message,
        fix: rule.fix.as_deref(),
        note: rule.note.as_deref(),
    })
}

fn render_fix(fix_pattern: &str, meta_vars: &HashMap<String, String>) -> String {
    let mut rendered = fix_pattern.to_string();
    for (key, value) in meta_vars {
        rendered = rendered.replace(&format!("${key}"), value);
    }
    rendered
}

struct Accumulated {
    violations: Vec<Violation>,
    failed_rules: Vec<(String, String)>,
    rules_executed: usize,
    stop: bool,
}

/// Run one rule: invoke the Executor, map matches to violations, apply the
/// File Gate's exclude patterns, and stop early once `max_violations` is hit.
async fn run_one_rule(
    matcher: &dyn Matcher,
    request: &EnforceRequest,
    rule: &Rule,
    remaining_budget: &AtomicUsize,
) -> std::result::Result<Vec<Violation>, (String, String)> {
    let rule_yaml = rule_to_wire_yaml(rule)
        .map_err(|e| (rule.id.clone(), format!("failed to serialize rule: {e}")))?;

    let match_request = MatchRequest {
        project_root: request.project_root.clone(),
        pattern_or_rule_yaml: rule_yaml,
        language: rule.language.clone(),
        max_results: None,
        timeout: std::time::Duration::from_secs(30),
        workers: None,
    };

    let mut stream = matcher
        .run(match_request)
        .await
        .map_err(|e| (rule.id.clone(), e.to_string()))?;

    let gate_request = GateRequest {
        project_root: request.project_root.clone(),
        language: rule.language.clone(),
        include_globs: request.include.clone(),
        exclude_globs: request.exclude.clone(),
    };
    let allowed_files: std::collections::HashSet<PathBuf> =
        eligible_files(&gate_request, &crate::core::config::FileGateConfig::default())
            .map_err(|e| (rule.id.clone(), e.to_string()))?
            .into_iter()
            .collect();

    let mut violations = Vec::new();
    loop {
        if request.max_violations != 0 && remaining_budget.load(Ordering::SeqCst) == 0 {
            stream.terminate().await;
            break;
        }
        match stream.next().await {
            Ok(Some(m)) => {
                let canonical_file = std::fs::canonicalize(&m.file).unwrap_or_else(|_| m.file.clone());
                if !allowed_files.is_empty() && !allowed_files.contains(&canonical_file) {
                    continue;
                }
                let fix_suggestion = rule.fix.as_deref().map(|f| render_fix(f, &m.meta_vars));
                violations.push(Violation {
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    message: rule.message.clone(),
                    file: m.file,
                    start: m.start,
                    end: m.end,
                    meta_vars: m.meta_vars,
                    fix_suggestion,
                });
                if request.max_violations != 0 {
                    remaining_budget.fetch_sub(1, Ordering::SeqCst);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "rule execution failed partway through");
                return Err((rule.id.clone(), e.to_string()));
            }
        }
    }
    Ok(violations)
}

/// Run a rule set across a project and produce a grouped [`EnforcementResult`].
pub async fn enforce(matcher: &dyn Matcher, request: EnforceRequest, rule_dir_name: &str) -> Result<EnforcementResult> {
    if !request.project_root.is_dir() {
        return Err(CoreError::invalid_field(
            "project_root does not exist or is not a directory",
            "project_root",
        ));
    }
    let rules = resolve_rules(&request, rule_dir_name)?;
    let started = Instant::now();

    let remaining_budget = Arc::new(AtomicUsize::new(if request.max_violations == 0 {
        usize::MAX
    } else {
        request.max_violations
    }));
    let accumulated = Arc::new(Mutex::new(Accumulated {
        violations: Vec::new(),
        failed_rules: Vec::new(),
        rules_executed: 0,
        stop: false,
    }));

    let parallelism = if request.parallelism == 0 {
        4
    } else {
        request.parallelism
    };

    stream::iter(rules.iter())
        .for_each_concurrent(parallelism, |rule| {
            let matcher = matcher;
            let request = &request;
            let budget = Arc::clone(&remaining_budget);
            let acc = Arc::clone(&accumulated);
            async move {
                if acc.lock().stop {
                    return;
                }
                match run_one_rule(matcher, request, rule, &budget).await {
                    Ok(violations) => {
                        let mut guard = acc.lock();
                        guard.violations.extend(violations);
                        guard.rules_executed += 1;
                        if request.max_violations != 0 && budget.load(Ordering::SeqCst) == 0 {
                            guard.stop = true;
                        }
                    }
                    Err((rule_id, stderr)) => {
                        let mut guard = acc.lock();
                        guard
                            .failed_rules
                            .push((rule_id, crate::core::errors::truncate_stderr(&stderr)));
                    }
                }
            }
        })
        .await;

    let guard = accumulated.lock();
    let mut violations: Vec<Violation> = guard
        .violations
        .iter()
        .filter(|v| severity_rank(v.severity) >= severity_rank(request.severity_threshold))
        .cloned()
        .collect();
    violations.sort_by(|a, b| a.file.cmp(&b.file).then(a.start.cmp(&b.start)));

    let mut by_file: HashMap<PathBuf, Vec<Violation>> = HashMap::new();
    let mut counts_by_severity: HashMap<String, usize> = HashMap::new();
    let mut counts_by_rule: HashMap<String, usize> = HashMap::new();
    for v in &violations {
        by_file.entry(v.file.clone()).or_default().push(v.clone());
        *counts_by_severity
            .entry(severity_label(v.severity).to_string())
            .or_insert(0) += 1;
        *counts_by_rule.entry(v.rule_id.clone()).or_insert(0) += 1;
    }
    let mut violations_by_file: Vec<(PathBuf, Vec<Violation>)> = by_file.into_iter().collect();
    violations_by_file.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, file_violations) in violations_by_file.iter_mut() {
        file_violations.sort_by_key(|v| v.start);
    }

    let gate_request = GateRequest {
        project_root: request.project_root.clone(),
        language: request.language.clone(),
        include_globs: request.include.clone(),
        exclude_globs: request.exclude.clone(),
    };
    let files_scanned =
        eligible_files(&gate_request, &crate::core::config::FileGateConfig::default())
            .map(|f| f.len())
            .unwrap_or(0);

    Ok(EnforcementResult {
        total_violations: violations.len(),
        violations_by_file,
        counts_by_severity,
        counts_by_rule,
        files_scanned,
        rules_executed: guard.rules_executed,
        failed_rules: guard.failed_rules.clone(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Match, Position};
    use crate::executor::ScriptedMatcher;
    use std::collections::HashMap as Map;
    use tempfile::tempdir;

    fn sample_match(file: PathBuf) -> Match {
        Match {
            file,
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 20 },
            text: "console.log('x')".into(),
            meta_vars: Map::new(),
        }
    }

    #[tokio::test]
    async fn enforce_recommended_set_finds_violations() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        std::fs::write(&file, "console.log('x')\n").unwrap();

        let matcher = ScriptedMatcher::with_matches(vec![sample_match(file)]);
        let request = EnforceRequest {
            project_root: dir.path().to_path_buf(),
            language: "javascript".into(),
            rule_set: Some("recommended".into()),
            custom_rule_ids: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            severity_threshold: Severity::Info,
            max_violations: 0,
            parallelism: 2,
        };
        let result = enforce(&matcher, request, ".ast-grep-rules").await.unwrap();
        assert!(result.total_violations > 0);
        assert_eq!(
            result.total_violations,
            result.counts_by_severity.values().sum::<usize>()
        );
        assert_eq!(
            result.total_violations,
            result.counts_by_rule.values().sum::<usize>()
        );
    }

    #[tokio::test]
    async fn invalid_project_root_is_rejected() {
        let matcher = ScriptedMatcher::with_matches(vec![]);
        let request = EnforceRequest {
            project_root: PathBuf::from("/does/not/exist/ever"),
            language: "javascript".into(),
            rule_set: Some("recommended".into()),
            custom_rule_ids: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            severity_threshold: Severity::Info,
            max_violations: 0,
            parallelism: 1,
        };
        assert!(enforce(&matcher, request, ".ast-grep-rules").await.is_err());
    }
}
