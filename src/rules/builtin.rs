//! Built-in rule sets (SPEC_FULL §C.5), embedded at compile time via
//! `include_str!` and parsed as multi-document YAML — each document is one
//! matcher-native rule, exactly the shape the Executor expects on the wire.

use crate::core::model::{Rule, RuleSet};

const RECOMMENDED_YAML: &str = include_str!("../../rule_sets/recommended.yaml");
const SECURITY_YAML: &str = include_str!("../../rule_sets/security.yaml");
const PERFORMANCE_YAML: &str = include_str!("../../rule_sets/performance.yaml");
const STYLE_YAML: &str = include_str!("../../rule_sets/style.yaml");

/// Names of the built-in rule sets recognized by `rule_set` (spec §6), not
/// including the synthetic `all`/`custom` selectors.
pub const BUILT_IN_SET_NAMES: &[&str] = &["recommended", "security", "performance", "style"];

fn parse_multi_document(yaml: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        match Rule::deserialize(document) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed rule document in built-in set");
            }
        }
    }
    rules
}

use serde::Deserialize;

/// Load one built-in rule set by name. Panics on an unrecognized name —
/// callers must check against [`BUILT_IN_SET_NAMES`] first, as [`super::resolve_rules`] does.
pub fn built_in_rule_set(name: &str) -> RuleSet {
    let (yaml, priority) = match name {
        "recommended" => (RECOMMENDED_YAML, 0),
        "security" => (SECURITY_YAML, 3),
        "performance" => (PERFORMANCE_YAML, 2),
        "style" => (STYLE_YAML, 1),
        other => panic!("unknown built-in rule set: {other}"),
    };
    RuleSet {
        name: name.to_string(),
        priority,
        rules: parse_multi_document(yaml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_built_in_set_parses_to_at_least_one_rule() {
        for name in BUILT_IN_SET_NAMES {
            let set = built_in_rule_set(name);
            assert!(!set.rules.is_empty(), "set {name} should not be empty");
        }
    }

    #[test]
    fn rule_ids_are_unique_within_recommended() {
        let set = built_in_rule_set("recommended");
        let mut ids: Vec<&str> = set.rules.iter().map(|r| r.id.as_str()).collect();
        let unique_len = {
            ids.sort();
            ids.dedup();
            ids.len()
        };
        assert_eq!(unique_len, set.rules.len());
    }
}
