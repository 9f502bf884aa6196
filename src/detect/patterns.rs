//! Built-in per-language construct-extraction patterns (SPEC_FULL §C.4):
//! a small, fixed table of matcher rule documents for "function definition"
//! per supported language, analogous to the teacher's `lang::registry`
//! language dispatch but handing the Executor a concrete single-document
//! rule YAML instead of dispatching to a tree-sitter adapter.

use crate::core::model::ConstructKind;

/// One language's construct-extraction rule, plus the [`ConstructKind`]
/// it produces.
#[derive(Debug, Clone, Copy)]
pub struct ConstructPattern {
    /// Single-document matcher rule YAML (never wrapped in `rules:`).
    pub rule_yaml: &'static str,
    /// The kind of construct this pattern extracts.
    pub kind: ConstructKind,
}

/// Look up the built-in function-extraction pattern for `language`,
/// falling back to a generic `pattern:`-only rule for unrecognized
/// languages (spec §6: unknown languages are handled best-effort, never
/// rejected outright).
pub fn construct_pattern_for(language: &str) -> ConstructPattern {
    match language {
        "python" => ConstructPattern {
            rule_yaml: "id: extract-function\nlanguage: python\nrule:\n  pattern: |\n    def $NAME($$$PARAMS):\n        $$$BODY\n",
            kind: ConstructKind::Function,
        },
        "javascript" | "typescript" => ConstructPattern {
            rule_yaml: "id: extract-function\nlanguage: javascript\nrule:\n  any:\n    - pattern: function $NAME($$$PARAMS) { $$$BODY }\n    - pattern: $NAME = ($$$PARAMS) => { $$$BODY }\n",
            kind: ConstructKind::Function,
        },
        "rust" => ConstructPattern {
            rule_yaml: "id: extract-function\nlanguage: rust\nrule:\n  pattern: |\n    fn $NAME($$$PARAMS) $$$REST\n",
            kind: ConstructKind::Function,
        },
        "go" => ConstructPattern {
            rule_yaml: "id: extract-function\nlanguage: go\nrule:\n  pattern: |\n    func $NAME($$$PARAMS) $$$REST\n",
            kind: ConstructKind::Function,
        },
        other => ConstructPattern {
            rule_yaml: Box::leak(
                format!("id: extract-function\nlanguage: {other}\nrule:\n  pattern: $NAME($$$PARAMS)\n")
                    .into_boxed_str(),
            ),
            kind: ConstructKind::Function,
        },
    }
}
