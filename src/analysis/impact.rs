//! Impact analysis (spec §4.10 step 4): identifier extraction and a
//! cross-file reference count, used to hint the Ranker's breaking-impact
//! multiplier.

use std::collections::HashSet;

use crate::core::model::DuplicateGroup;

/// Per-group impact summary.
#[derive(Debug, Clone)]
pub struct ImpactAnalysis {
    /// The group this analysis covers.
    pub group_id: String,
    /// Distinct identifiers referenced across the group's instances.
    pub identifiers: Vec<String>,
    /// Number of distinct files (beyond the first) containing an instance —
    /// a proxy for how widely a change to this construct would ripple.
    pub cross_file_reference_count: usize,
}

fn extract_identifiers(tokens: &[String]) -> HashSet<String> {
    tokens
        .iter()
        .filter(|t| t.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
        .cloned()
        .collect()
}

/// Compute impact for one [`DuplicateGroup`] (spec §4.10 step 4).
pub fn impact_analysis(group: &DuplicateGroup) -> ImpactAnalysis {
    let mut identifiers: HashSet<String> = HashSet::new();
    let mut files: HashSet<&std::path::Path> = HashSet::new();
    for instance in &group.instances {
        identifiers.extend(extract_identifiers(&instance.tokens));
        files.insert(instance.file.as_path());
    }
    let mut identifiers: Vec<String> = identifiers.into_iter().collect();
    identifiers.sort();

    ImpactAnalysis {
        group_id: group.group_id.clone(),
        identifiers,
        cross_file_reference_count: files.len().saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Construct, ConstructKind, VariationClassification};
    use std::path::PathBuf;

    fn construct(file: &str, tokens: Vec<&str>) -> Construct {
        Construct {
            id: format!("{file}:1"),
            file: PathBuf::from(file),
            range: (1, 3),
            language: "python".into(),
            kind: ConstructKind::Function,
            normalized_text: tokens.join(" "),
            tokens: tokens.into_iter().map(String::from).collect(),
            structure_hash: 0,
        }
    }

    #[test]
    fn counts_distinct_files_beyond_the_first() {
        let group = DuplicateGroup {
            group_id: "g1".into(),
            instances: vec![
                construct("a.py", vec!["def", "f", "x"]),
                construct("b.py", vec!["def", "f", "y"]),
            ],
            representative: 0,
            pairwise_similarity: 0.9,
            lines_saved_estimate: 3,
            complexity_score: 2.0,
            variation_classification: VariationClassification::IdentifierVarying,
        };
        let impact = impact_analysis(&group);
        assert_eq!(impact.cross_file_reference_count, 1);
        assert!(impact.identifiers.contains(&"def".to_string()));
    }
}
