//! End-to-end scenarios exercising the public tool surface against a
//! scripted matcher, one per host-facing operation family: detection,
//! enforcement, safe-fix-and-rollback, atomic multi-file refactor,
//! cache hit/miss semantics, and ranker determinism.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::tempdir;

use sgcore::core::config::CoreConfig;
use sgcore::core::context::CoreContext;
use sgcore::core::model::{
    ConstructKind, DuplicateGroup, GeneratedReplacement, Match, Position, RefactoringPlan, Severity,
    VariationClassification, Violation,
};
use sgcore::executor::{MatchRequest, MatchStream, Matcher, ScriptedMatcher};
use sgcore::rank::ranker::{BreakingImpact, RankingContext};
use sgcore::rank::Ranker;
use sgcore::tools::{self, FixTypes};

fn make_match(file: &str, start: usize, end: usize, text: &str) -> Match {
    Match {
        file: PathBuf::from(file),
        start: Position { line: start, column: 1 },
        end: Position { line: end, column: 1 },
        text: text.to_string(),
        meta_vars: HashMap::new(),
    }
}

/// Routes a rule-engine query to a canned match list by the rule `id:`
/// embedded in its single-document YAML, the way the real matcher would
/// route by pattern. Also records every `pattern_or_rule_yaml` it was
/// handed, so tests can assert on the wire shape sent to the subprocess.
struct RuleRoutedMatcher {
    routes: HashMap<&'static str, Vec<Match>>,
    seen: Mutex<Vec<String>>,
}

impl RuleRoutedMatcher {
    fn new(routes: HashMap<&'static str, Vec<Match>>) -> Self {
        Self { routes, seen: Mutex::new(Vec::new()) }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Matcher for RuleRoutedMatcher {
    async fn run(&self, request: MatchRequest) -> sgcore::core::errors::Result<MatchStream> {
        self.seen.lock().unwrap().push(request.pattern_or_rule_yaml.clone());
        let id = request
            .pattern_or_rule_yaml
            .lines()
            .find_map(|l| l.strip_prefix("id: "))
            .unwrap_or_default();
        let matches = self.routes.get(id).cloned().unwrap_or_default();
        Ok(MatchStream::Scripted(matches.into()))
    }
}

// --- Scenario 1: duplicate detection -------------------------------------

#[tokio::test]
async fn duplicate_detection_groups_two_identical_functions() {
    let project = tempdir().unwrap();
    let body = "def f(x):\n    return x + 1\n";
    let a_path = project.path().join("a.py");
    let b_path = project.path().join("b.py");
    std::fs::write(&a_path, body).unwrap();
    std::fs::write(&b_path, body).unwrap();

    let matcher = ScriptedMatcher::with_matches(vec![
        make_match(&a_path.display().to_string(), 1, 2, body),
        make_match(&b_path.display().to_string(), 1, 2, body),
    ]);
    let context = CoreContext::new(CoreConfig::default());

    let groups = tools::find_duplication(
        &matcher,
        &context,
        project.path().to_path_buf(),
        "python".into(),
        Some(0.9),
        Some(1),
        Vec::new(),
    )
    .await
    .unwrap();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.instances.len(), 2);
    assert!(group.pairwise_similarity >= 0.9);
    let representative = &group.instances[group.representative];
    assert_eq!(representative.file, a_path);
}

// --- Scenario 2: rule execution regression guard --------------------------

fn console_log_violation_match(file: &str) -> Match {
    make_match(file, 1, 1, "console.log(\"x\")")
}

fn var_violation_match(file: &str) -> Match {
    let mut m = make_match(file, 2, 2, "var a = 1");
    m.meta_vars.insert("NAME".into(), "a".into());
    m.meta_vars.insert("VALUE".into(), "1".into());
    m
}

fn recommended_js_routes(file: &str) -> HashMap<&'static str, Vec<Match>> {
    let mut routes = HashMap::new();
    routes.insert("no-console-log", vec![console_log_violation_match(file)]);
    routes.insert("no-var", vec![var_violation_match(file)]);
    routes.insert("no-debugger", Vec::new());
    routes
}

#[tokio::test]
async fn enforce_recommended_set_flags_console_log_and_var() {
    let project = tempdir().unwrap();
    let file = project.path().join("a.js");
    std::fs::write(&file, "console.log(\"x\")\nvar a = 1\n").unwrap();
    let file_str = file.display().to_string();

    let matcher = RuleRoutedMatcher::new(recommended_js_routes(&file_str));
    let context = CoreContext::new(CoreConfig::default());

    let result = tools::enforce_standards(
        &matcher,
        &context,
        project.path().to_path_buf(),
        "javascript".into(),
        Some("recommended".into()),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        None,
        None,
        None,
        ".ast-grep-rules",
    )
    .await
    .unwrap();

    assert_eq!(result.total_violations, 2);
    assert_eq!(*result.counts_by_rule.get("no-console-log").unwrap(), 1);
    assert_eq!(*result.counts_by_rule.get("no-var").unwrap(), 1);

    let (_, file_violations) = &result.violations_by_file[0];
    assert_eq!(file_violations[0].rule_id, "no-console-log");
    assert_eq!(file_violations[0].start.line, 1);
    assert_eq!(file_violations[1].rule_id, "no-var");
    assert_eq!(file_violations[1].start.line, 2);
    assert_eq!(file_violations[1].fix_suggestion.as_deref(), Some("let a = 1"));

    // every query sent to the matcher is a single-document rule, never wrapped in `rules:`
    for yaml in matcher.seen() {
        assert!(!yaml.trim_start().starts_with("rules:"));
        assert!(yaml.starts_with("id: "));
    }
}

// --- Scenario 3: safe-fix batch, then byte-for-byte rollback -------------

#[tokio::test]
async fn safe_fix_batch_applies_then_rollback_restores_bytes() {
    let project = tempdir().unwrap();
    let file = project.path().join("a.js");
    let original = "console.log(\"x\")\nvar a = 1\n";
    std::fs::write(&file, original).unwrap();

    let violations = vec![
        Violation {
            rule_id: "no-console-log".into(),
            severity: Severity::Warning,
            message: "remove console.log before committing".into(),
            file: PathBuf::from("a.js"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 18 },
            meta_vars: HashMap::new(),
            fix_suggestion: Some(String::new()),
        },
        Violation {
            rule_id: "no-var".into(),
            severity: Severity::Warning,
            message: "use 'let' or 'const' instead of 'var'".into(),
            file: PathBuf::from("a.js"),
            start: Position { line: 2, column: 1 },
            end: Position { line: 2, column: 10 },
            meta_vars: HashMap::new(),
            fix_suggestion: Some("let a = 1;".into()),
        },
    ];

    let backups_root = project.path().join(".backups");
    let batch = tools::apply_standards_fixes(
        backups_root.clone(),
        &violations,
        project.path().to_path_buf(),
        FixTypes::Safe,
        true,
        true,
    )
    .unwrap();

    assert!(batch.validation_passed);
    assert_eq!(batch.successful, 2);
    let backup_id = batch.backup_id.clone().expect("backup created before writing");

    let after_fix = std::fs::read_to_string(&file).unwrap();
    assert_eq!(after_fix, "\nlet a = 1;\n");

    let restore = tools::rollback_rewrite(backups_root, &backup_id).unwrap();
    assert!(restore.errors.is_empty());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
}

// --- Scenario 4: atomic multi-file refactor, never partially applied ----

#[tokio::test]
async fn plan_apply_rejects_whole_plan_when_one_file_fails_validation() {
    let project = tempdir().unwrap();
    let a = project.path().join("a.js");
    let b = project.path().join("b.js");
    std::fs::write(&a, "function f() {\n  return 1;\n}\n").unwrap();
    std::fs::write(&b, "function g() {\n  return 2;\n}\n").unwrap();

    let mut replacements = HashMap::new();
    replacements.insert(
        PathBuf::from("a.js"),
        GeneratedReplacement {
            new_content: "function f() {\n  return helper();\n}\n".into(),
            changes: vec!["delegate to helper".into()],
        },
    );
    // Deliberately unbalanced braces: the pre-apply content validator must
    // reject the whole plan before either file is touched.
    replacements.insert(
        PathBuf::from("b.js"),
        GeneratedReplacement {
            new_content: "function g() {\n  return helper(;\n".into(),
            changes: vec!["delegate to helper".into()],
        },
    );

    let plan = RefactoringPlan {
        strategy: "extract_function".into(),
        files_affected: vec![PathBuf::from("a.js"), PathBuf::from("b.js")],
        replacements,
        extract_to_file: None,
        extracted_function: None,
        language: "javascript".into(),
    };

    let backups_root = project.path().join(".backups");
    let result = tools::apply_deduplication(backups_root, &plan, project.path().to_path_buf(), false, true).await;

    assert!(result.is_err(), "malformed replacement must reject the whole plan, not just its own file");
    assert_eq!(std::fs::read_to_string(&a).unwrap(), "function f() {\n  return 1;\n}\n");
    assert_eq!(std::fs::read_to_string(&b).unwrap(), "function g() {\n  return 2;\n}\n");
}

// --- Scenario 5: cache hit/miss semantics, with and without the disable switch

#[tokio::test]
async fn identical_queries_are_cached_until_disabled() {
    let project = tempdir().unwrap();
    let body = "def f(x):\n    return x + 1\n";
    let a_path = project.path().join("a.py");
    let b_path = project.path().join("b.py");
    std::fs::write(&a_path, body).unwrap();
    std::fs::write(&b_path, body).unwrap();

    let inner = ScriptedMatcher::with_matches(vec![
        make_match(&a_path.display().to_string(), 1, 2, body),
        make_match(&b_path.display().to_string(), 1, 2, body),
    ]);
    let context = CoreContext::new(CoreConfig::default());

    for _ in 0..2 {
        tools::find_duplication(
            &inner,
            &context,
            project.path().to_path_buf(),
            "python".into(),
            Some(0.9),
            Some(1),
            Vec::new(),
        )
        .await
        .unwrap();
    }
    assert_eq!(inner.requests_seen().len(), 1, "second call should be served from cache");
    assert_eq!(context.query_cache.stats().hits, 1);

    context.disable_cache();
    for _ in 0..2 {
        tools::find_duplication(
            &inner,
            &context,
            project.path().to_path_buf(),
            "python".into(),
            Some(0.9),
            Some(1),
            Vec::new(),
        )
        .await
        .unwrap();
    }
    assert_eq!(inner.requests_seen().len(), 3, "disabled cache must call through every time");
}

// --- Scenario 6: ranker determinism --------------------------------------

fn ranked_group(id: &str, lines_saved: i64, complexity: f64, files: &[&str]) -> DuplicateGroup {
    use sgcore::core::model::Construct;
    let instances: Vec<Construct> = files
        .iter()
        .enumerate()
        .map(|(i, f)| Construct {
            id: format!("{id}-{i}"),
            file: PathBuf::from(*f),
            range: (1, 10),
            language: "python".into(),
            kind: ConstructKind::Function,
            normalized_text: "def f(): pass".into(),
            tokens: vec!["def".into(), "f".into()],
            structure_hash: 0,
        })
        .collect();
    DuplicateGroup {
        group_id: id.to_string(),
        instances,
        representative: 0,
        pairwise_similarity: 0.9,
        lines_saved_estimate: lines_saved,
        complexity_score: complexity,
        variation_classification: VariationClassification::IdentifierVarying,
    }
}

#[tokio::test]
async fn ranker_orders_by_formula_deterministically() {
    // group A: lower savings, but low complexity and well-covered low-risk code
    let group_a = ranked_group("a", 50, 5.0, &["f0.py", "f0.py", "f1.py"]);
    // group B: higher savings, but unproven, high-risk, poorly covered code
    let group_b = ranked_group("b", 200, 10.0, &["f0.py", "f1.py", "f2.py", "f2.py"]);

    let ranker = Ranker::new(CoreConfig::default().ranking, None);
    let ranked = ranker.rank(vec![group_a, group_b], |g| match g.group_id.as_str() {
        "a" => RankingContext {
            coverage_percent: Some(80.0),
            impact_hint: Some(BreakingImpact::Medium),
            complexity_present: true,
        },
        _ => RankingContext {
            coverage_percent: Some(0.0),
            impact_hint: Some(BreakingImpact::High),
            complexity_present: true,
        },
    });

    assert_eq!(ranked[0].group.group_id, "a");
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[0].total_score, 34.41);
    assert_eq!(ranked[1].group.group_id, "b");
    assert_eq!(ranked[1].rank, 2);
    assert_eq!(ranked[1].total_score, 23.5);
}
