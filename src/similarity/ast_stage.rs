//! AST/structure verification stage (spec §4.4): a lightweight, tree-sitter
//! free approximation — normalize source text, then compare an AST-like
//! node-sequence pattern (control-flow keywords, call signatures, a
//! logarithmic size bucket, and a nesting-depth estimate).

use crate::core::model::Construct;

const CONTROL_FLOW_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "match", "switch", "case", "try", "except", "catch",
    "finally", "return", "break", "continue", "yield",
];

/// Strip comments, collapse whitespace, and canonicalize indentation.
pub fn normalize_code(source: &str) -> String {
    let mut out = String::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// A coarse structural fingerprint used for AST-stage comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructurePattern {
    control_flow_sequence: Vec<&'static str>,
    call_signatures: Vec<usize>,
    size_bucket: u32,
    nesting_estimate: u32,
}

impl StructurePattern {
    /// Derive the structural pattern of a normalized token stream.
    pub fn from_tokens(tokens: &[String]) -> Self {
        let control_flow_sequence = tokens
            .iter()
            .filter_map(|t| {
                CONTROL_FLOW_KEYWORDS
                    .iter()
                    .find(|kw| t == *kw)
                    .copied()
            })
            .collect();

        let mut call_signatures = Vec::new();
        let mut i = 0;
        while i + 1 < tokens.len() {
            if tokens[i + 1] == "(" {
                call_signatures.push(tokens[i].len());
            }
            i += 1;
        }

        let size_bucket = if tokens.is_empty() {
            0
        } else {
            (tokens.len() as f64).log2().floor() as u32
        };

        let mut depth: i32 = 0;
        let mut max_depth: i32 = 0;
        for t in tokens {
            match t.as_str() {
                "{" | "(" | "[" => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                "}" | ")" | "]" => depth -= 1,
                _ => {}
            }
        }

        Self {
            control_flow_sequence,
            call_signatures,
            size_bucket,
            nesting_estimate: max_depth.max(0) as u32,
        }
    }

    /// Structural similarity in `[0,1]` against another pattern.
    pub fn similarity(&self, other: &Self) -> f64 {
        let cf_sim = sequence_similarity(&self.control_flow_sequence, &other.control_flow_sequence);
        let call_sim = sequence_similarity(&self.call_signatures, &other.call_signatures);
        let bucket_sim = if self.size_bucket == other.size_bucket {
            1.0
        } else {
            let diff = (self.size_bucket as i64 - other.size_bucket as i64).unsigned_abs() as f64;
            (1.0 - diff / 8.0).max(0.0)
        };
        let nesting_sim = if self.nesting_estimate == other.nesting_estimate {
            1.0
        } else {
            let diff = (self.nesting_estimate as i64 - other.nesting_estimate as i64).unsigned_abs() as f64;
            (1.0 - diff / 8.0).max(0.0)
        };
        ((cf_sim + call_sim + bucket_sim + nesting_sim) / 4.0).clamp(0.0, 1.0)
    }
}

fn sequence_similarity<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    let max_len = a.len().max(b.len());
    matches as f64 / max_len as f64
}

/// AST-stage similarity between two Constructs, in `[0,1]`.
pub fn ast_similarity(a: &Construct, b: &Construct) -> f64 {
    if a.tokens.is_empty() || b.tokens.is_empty() {
        return 0.0;
    }
    let pa = StructurePattern::from_tokens(&a.tokens);
    let pb = StructurePattern::from_tokens(&b.tokens);
    pa.similarity(&pb)
}
