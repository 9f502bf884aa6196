//! Fix-safety classification (spec §4.8): a built-in table mapping rule ids
//! to an `is_safe`/confidence/review verdict, cross-referenced against the
//! rule ids shipped in `rule_sets/*.yaml`.

use crate::core::model::{FixKind, FixValidation};

/// `(rule_id, confidence, kind)`. Confidence >= 0.9 is safe to auto-apply;
/// < 0.8 requires human review before applying (spec §4.8).
pub const FIX_SAFETY_TABLE: &[(&str, f64, FixKind)] = &[
    ("no-var", 0.95, FixKind::Safe),
    ("no-console-log", 0.95, FixKind::Removal),
    ("no-debugger", 0.95, FixKind::Removal),
    ("no-print", 0.9, FixKind::Removal),
    ("double-equals", 0.92, FixKind::Safe),
    ("eval-removal", 0.5, FixKind::Pattern),
    ("sql-parameterize", 0.6, FixKind::Pattern),
    ("empty-catch-fill", 0.65, FixKind::Pattern),
];

const DEFAULT_UNKNOWN_CONFIDENCE: f64 = 0.7;

/// Classify a rule id's fix safety. Unknown rule ids default to
/// [`FixKind::Suggested`]-range confidence, requiring review.
pub fn classify_fix(rule_id: &str) -> FixValidation {
    match FIX_SAFETY_TABLE.iter().find(|(id, ..)| *id == rule_id) {
        Some((_, confidence, kind)) => FixValidation {
            is_safe: *confidence >= 0.9,
            confidence: *confidence,
            warnings: Vec::new(),
            requires_review: *confidence < 0.8,
            kind: *kind,
        },
        None => FixValidation {
            is_safe: false,
            confidence: DEFAULT_UNKNOWN_CONFIDENCE,
            warnings: vec![format!("no built-in safety classification for rule `{rule_id}`")],
            requires_review: true,
            kind: FixKind::Pattern,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_safe_rule_is_safe_and_not_review_required() {
        let v = classify_fix("no-var");
        assert!(v.is_safe);
        assert!(!v.requires_review);
    }

    #[test]
    fn review_required_rule_is_not_safe() {
        let v = classify_fix("eval-removal");
        assert!(!v.is_safe);
        assert!(v.requires_review);
    }

    #[test]
    fn unknown_rule_defaults_to_review_required() {
        let v = classify_fix("made-up-rule");
        assert!(v.requires_review);
        assert!(!v.warnings.is_empty());
    }
}
