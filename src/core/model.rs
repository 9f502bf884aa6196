//! Shared data model (spec §3): the entities that flow between components.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single structural hit emitted by the Executor. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    /// Absolute, canonicalized path of the file the match was found in.
    pub file: PathBuf,
    /// Start line/column (1-indexed, matching the matcher's own convention).
    pub start: Position,
    /// End line/column.
    pub end: Position,
    /// The exact matched source text.
    pub text: String,
    /// Captured metavariable substrings, keyed by identifier (e.g. `$NAME`).
    pub meta_vars: HashMap<String, String>,
}

impl Match {
    /// `true` when `start <= end` lexicographically, per the universal invariant in spec §8.
    pub fn has_valid_range(&self) -> bool {
        self.start <= self.end
    }
}

/// A line/column position, 1-indexed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

/// The kind of structural unit a [`Construct`] represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    /// A free function or top-level procedure.
    Function,
    /// A class, struct, or equivalent type definition.
    Class,
    /// A method defined on a class/struct.
    Method,
    /// An arbitrary block (loop body, conditional body, …) below function granularity.
    Block,
}

/// A structural unit extracted from one or more [`Match`]es for duplication
/// analysis. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Construct {
    /// Stable identifier, derived from file + range, used as a map/index key.
    pub id: String,
    /// Source file.
    pub file: PathBuf,
    /// Start/end lines (1-indexed, inclusive).
    pub range: (usize, usize),
    /// Source language, lower-case (`"python"`, `"typescript"`, …).
    pub language: String,
    /// Function, class, method, or block.
    pub kind: ConstructKind,
    /// Comment-stripped, whitespace-collapsed source text.
    pub normalized_text: String,
    /// Ordered token stream computed from `normalized_text`.
    pub tokens: Vec<String>,
    /// Stable structural hash (spec §4.4 AST/structure stage input).
    pub structure_hash: u64,
}

impl Construct {
    /// Line count spanned by this construct (inclusive range).
    pub fn line_count(&self) -> usize {
        self.range.1.saturating_sub(self.range.0) + 1
    }

    /// Byte size of the normalized text, used for the size-ratio filter (spec §3 invariant 2).
    pub fn byte_size(&self) -> usize {
        self.normalized_text.len()
    }
}

/// How a [`DuplicateGroup`]'s instances vary from one another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VariationClassification {
    /// Byte-for-byte identical after normalization.
    Identical,
    /// Differ only in literal values (numbers, strings).
    LiteralVarying,
    /// Differ only in identifier names.
    IdentifierVarying,
    /// Differ in control-flow/structure beyond identifiers and literals.
    StructuralVarying,
}

/// A cluster of ≥2 similar [`Construct`]s (spec §3 invariant 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Stable cluster identifier.
    pub group_id: String,
    /// Member constructs, in file-traversal order.
    pub instances: Vec<Construct>,
    /// Index into `instances` chosen as the representative (first by traversal order).
    pub representative: usize,
    /// Mean pairwise hybrid similarity across the group, in `[0, 1]`.
    pub pairwise_similarity: f64,
    /// `Σ(sizes) − max(size)`, an estimate of lines removable by deduplicating.
    pub lines_saved_estimate: i64,
    /// Opaque complexity score, normally supplied by an external complexity calculator (spec §1).
    pub complexity_score: f64,
    /// How the instances differ from one another.
    pub variation_classification: VariationClassification,
}

/// Named component scores backing a [`RankedCandidate::total_score`] (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ComponentScores {
    /// Weighted savings component (0.40).
    pub savings: f64,
    /// Weighted complexity component (0.20).
    pub complexity: f64,
    /// Weighted risk component (0.25).
    pub risk: f64,
    /// Weighted effort component (0.15).
    pub effort: f64,
}

impl ComponentScores {
    /// Sum of the four weighted components, rounded to 2 decimals (spec §3 invariant 3).
    pub fn total(&self) -> f64 {
        round2(self.savings + self.complexity + self.risk + self.effort)
    }
}

/// Priority bucket assigned from a [`RankedCandidate::total_score`] (spec §3 invariant 3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// `total_score >= 80`.
    Critical,
    /// `total_score >= 60`.
    High,
    /// `total_score >= 40`.
    Medium,
    /// `total_score >= 20`.
    Low,
    /// `total_score < 20`.
    Minimal,
}

impl Priority {
    /// Classify a total score using the thresholds fixed in spec §3/§4.6.
    pub fn from_score(total_score: f64) -> Self {
        if total_score >= 80.0 {
            Priority::Critical
        } else if total_score >= 60.0 {
            Priority::High
        } else if total_score >= 40.0 {
            Priority::Medium
        } else if total_score >= 20.0 {
            Priority::Low
        } else {
            Priority::Minimal
        }
    }
}

/// A [`DuplicateGroup`] annotated with a score, rank, and priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// The scored group.
    pub group: DuplicateGroup,
    /// `round(Σ component_scores, 2)`.
    pub total_score: f64,
    /// The four weighted components that sum to `total_score`.
    pub component_scores: ComponentScores,
    /// Priority bucket derived from `total_score`.
    pub priority: Priority,
    /// 1-indexed rank after descending sort (stable tie-break on `group_id`).
    pub rank: usize,
    /// Optional human-readable recommendation text.
    pub recommendation: Option<String>,
    /// Optional test-coverage percentage (0-100) for the group's files.
    pub test_coverage: Option<f64>,
}

/// Severity of a [`Rule`]/[`Violation`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Should probably be fixed.
    Warning,
    /// Must be fixed.
    Error,
}

/// A named structural pattern with fix semantics (spec §3), serialized as the
/// matcher's native single-document rule YAML on the wire and on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Kebab-case identifier, unique within an effective rule set.
    pub id: String,
    /// Target language.
    pub language: String,
    /// Severity if violated.
    pub severity: Severity,
    /// Human-readable violation message.
    pub message: String,
    /// Matcher pattern source (the `rule:` body, not wrapped in `rules:`).
    pub pattern: String,
    /// Optional fix pattern with metavariable references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    /// Optional free-form note shown alongside the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Optional metavariable constraints, passed through to the matcher verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
}

/// A named collection of [`Rule`]s with a merge priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Set name (`"recommended"`, `"security"`, a custom directory name, …).
    pub name: String,
    /// Higher wins on id collision when sets are merged (spec §3 invariant 6).
    pub priority: i32,
    /// Member rules.
    pub rules: Vec<Rule>,
}

/// A [`Match`] interpreted against a [`Rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// The rule that produced this violation.
    pub rule_id: String,
    /// Severity, copied from the rule at match time.
    pub severity: Severity,
    /// Message, copied from the rule (may be metavar-interpolated).
    pub message: String,
    /// File the violation occurred in.
    pub file: PathBuf,
    /// Location of the violating match.
    pub start: Position,
    /// End location of the violating match.
    pub end: Position,
    /// Captured metavariables, for fix rendering.
    pub meta_vars: HashMap<String, String>,
    /// Rendered fix suggestion, if the rule has a `fix` pattern.
    pub fix_suggestion: Option<String>,
}

/// Aggregate of [`Violation`]s with summary counts (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnforcementResult {
    /// All violations surviving the severity threshold, grouped by file (sorted by line).
    pub violations_by_file: Vec<(PathBuf, Vec<Violation>)>,
    /// Counts keyed by severity label (`"info"`, `"warning"`, `"error"`).
    pub counts_by_severity: HashMap<String, usize>,
    /// Counts keyed by rule id.
    pub counts_by_rule: HashMap<String, usize>,
    /// Total violation count (spec §3 invariant 5).
    pub total_violations: usize,
    /// Files actually scanned.
    pub files_scanned: usize,
    /// Rules actually executed (a rule whose subprocess failed is excluded).
    pub rules_executed: usize,
    /// Rules that failed to execute, with a truncated stderr snippet.
    pub failed_rules: Vec<(String, String)>,
    /// Wall-clock duration of the whole enforcement run, in seconds.
    pub elapsed_secs: f64,
}

/// A generated replacement for one file within a [`RefactoringPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReplacement {
    /// Full replacement content for the file.
    pub new_content: String,
    /// Human-readable summary of what changed, for diff/report display.
    pub changes: Vec<String>,
}

/// Declarative multi-file change consumed by the Refactor Orchestrator (spec §3/§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactoringPlan {
    /// Named strategy (`"extract_function"`, `"replace_in_place"`, …).
    pub strategy: String,
    /// Every file this plan touches.
    pub files_affected: Vec<PathBuf>,
    /// Full replacement content, keyed by affected path.
    pub replacements: HashMap<PathBuf, GeneratedReplacement>,
    /// Destination for a newly extracted function/module, if any.
    pub extract_to_file: Option<PathBuf>,
    /// Source text of the extracted function, if any.
    pub extracted_function: Option<String>,
    /// Target language, for the lightweight post-write validator.
    pub language: String,
}

/// One line of an `apply`/`dry_run` diff, at whole-file granularity (teacher-style
/// unified-diff rendering is out of scope; spec §4.8 only asks for intended content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    /// File affected.
    pub path: PathBuf,
    /// Content before the change, or `None` for a newly created file.
    pub before: Option<String>,
    /// Content after the change.
    pub after: String,
}

/// Outcome of [`crate::refactor::RefactorOrchestrator::apply`] (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Files actually written to disk (empty on rollback or dry-run).
    pub files_modified: Vec<PathBuf>,
    /// Backup id created before writing, if `create_backup` was requested.
    pub backup_id: Option<String>,
    /// Before/after content per affected file.
    pub diffs: Vec<FileDiff>,
    /// `true` iff every write and post-validation check succeeded.
    pub validation_passed: bool,
}

/// Per-rule safety assessment used to gate automatic fix application (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixValidation {
    /// `true` when `confidence >= 0.9`.
    pub is_safe: bool,
    /// Confidence in `[0.6, 1.0]` that the fix is behavior-preserving.
    pub confidence: f64,
    /// Free-form caveats surfaced to the caller.
    pub warnings: Vec<String>,
    /// `true` when `confidence < 0.8`: a human should look before applying.
    pub requires_review: bool,
    /// Structural class of the underlying fix.
    pub kind: FixKind,
}

/// The class a [`FixValidation`] falls into, by confidence band (spec §6 glossary).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FixKind {
    /// confidence >= 0.9: purely textual, no behavior change.
    Safe,
    /// 0.7 <= confidence < 0.9: plausible but not auto-applied without review by default.
    Suggested,
    /// Fix deletes code outright (e.g. `console.log`/`debugger` removal).
    Removal,
    /// Any other pattern-driven replacement.
    Pattern,
}

/// Outcome of applying one [`Violation`]'s fix (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    /// File the fix was applied to.
    pub file: PathBuf,
    /// Original matched text.
    pub original_text: String,
    /// Rendered replacement text.
    pub fixed_text: String,
    /// `true` if the write (and, when checked, syntax validation) succeeded.
    pub success: bool,
    /// `true` if the containing file parsed under the language's lightweight validator after the fix.
    pub syntax_valid: bool,
    /// Error message, set iff `success` is `false`.
    pub error: Option<String>,
    /// Fix-safety classification used to select this fix.
    pub fix_kind: FixKind,
}

/// Aggregate outcome of a rule-driven batch fix run (spec §3 invariant 7).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixBatchResult {
    /// Backup created before the batch, if any.
    pub backup_id: Option<String>,
    /// Number of fixes attempted.
    pub attempted: usize,
    /// Number of fixes that wrote successfully and validated.
    pub successful: usize,
    /// Number of fixes that failed (and were rolled back file-locally).
    pub failed: usize,
    /// Files actually modified by a successful fix.
    pub files_modified: Vec<PathBuf>,
    /// `true` iff every attempted fix in the batch succeeded.
    pub validation_passed: bool,
    /// Per-fix outcomes, in application order.
    pub results: Vec<FixResult>,
}

/// Round to 2 decimal places, matching the spec's scoring invariants.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamp a similarity/score float into `[0, 1]`.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_thresholds_match_spec() {
        assert_eq!(Priority::from_score(80.0), Priority::Critical);
        assert_eq!(Priority::from_score(79.99), Priority::High);
        assert_eq!(Priority::from_score(60.0), Priority::High);
        assert_eq!(Priority::from_score(40.0), Priority::Medium);
        assert_eq!(Priority::from_score(20.0), Priority::Low);
        assert_eq!(Priority::from_score(19.99), Priority::Minimal);
    }

    #[test]
    fn component_scores_sum_rounds_to_two_decimals() {
        let scores = ComponentScores {
            savings: 12.333,
            complexity: 10.0,
            risk: 5.111,
            effort: 1.0,
        };
        assert_eq!(scores.total(), 28.44);
    }

    #[test]
    fn match_range_ordering() {
        let m = Match {
            file: PathBuf::from("/a.py"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 5 },
            text: "x".into(),
            meta_vars: HashMap::new(),
        };
        assert!(m.has_valid_range());
    }
}
