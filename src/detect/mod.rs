//! Duplication Detector (spec §4.5): extracts [`Construct`]s via the
//! Executor and File Gate, clusters similar ones with union-find, and
//! produces [`DuplicateGroup`]s.

mod patterns;

pub use patterns::construct_pattern_for;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::warn;

use crate::core::config::SimilarityConfig;
use crate::core::context::CoreContext;
use crate::core::errors::Result;
use crate::core::model::{Construct, ConstructKind, DuplicateGroup, VariationClassification};
use crate::executor::{MatchRequest, Matcher};
use crate::gate::{eligible_files, GateRequest};
use crate::similarity::ast_stage::{ast_similarity, normalize_code};
use crate::similarity::minhash::{lcs_ratio, LshIndex, MinHashSignature};

/// Parameters for one duplication query (spec §4.5).
#[derive(Debug, Clone)]
pub struct FindDuplicationRequest {
    /// Project root to scan.
    pub project_root: PathBuf,
    /// Target language.
    pub language: String,
    /// Minimum hybrid similarity for a pair to be accepted (default 0.8 at the tool surface).
    pub min_similarity: f64,
    /// Minimum construct line count to be considered (default 5).
    pub min_lines: usize,
    /// Glob patterns excluded from the file set.
    pub exclude_patterns: Vec<String>,
}

/// Union-find over construct indices, used to coalesce verified-similar
/// pairs into groups (spec §4.5 step 5).
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Extract constructs matching the given language's function/class/method
/// patterns: one project-wide Executor call (the matcher's own `scan`
/// already walks the whole tree), with results filtered down to the File
/// Gate's eligible-file set.
async fn extract_constructs(
    matcher: &dyn Matcher,
    request: &FindDuplicationRequest,
) -> Result<Vec<Construct>> {
    let gate_request = GateRequest {
        project_root: request.project_root.clone(),
        language: request.language.clone(),
        include_globs: Vec::new(),
        exclude_globs: request.exclude_patterns.clone(),
    };
    let files = eligible_files(&gate_request, &crate::core::config::FileGateConfig::default())?;
    let eligible: HashSet<PathBuf> = files
        .iter()
        .map(|f| std::fs::canonicalize(f).unwrap_or_else(|_| f.clone()))
        .collect();

    let pattern = construct_pattern_for(&request.language);
    let mut constructs = Vec::new();

    let match_request = MatchRequest {
        project_root: request.project_root.clone(),
        pattern_or_rule_yaml: pattern.rule_yaml.to_string(),
        language: request.language.clone(),
        max_results: None,
        timeout: std::time::Duration::from_secs(30),
        workers: None,
    };
    let mut stream = match matcher.run(match_request).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "matcher failed to extract constructs for project");
            return Ok(Vec::new());
        }
    };
    loop {
        match stream.next().await {
            Ok(Some(m)) => {
                let canonical_file = std::fs::canonicalize(&m.file).unwrap_or_else(|_| m.file.clone());
                if !eligible.contains(&canonical_file) {
                    continue;
                }
                let line_count = m.end.line.saturating_sub(m.start.line) + 1;
                if line_count < request.min_lines {
                    continue;
                }
                let normalized = normalize_code(&m.text);
                let tokens: Vec<String> =
                    normalized.split_whitespace().map(String::from).collect();
                let structure_hash = {
                    use std::hash::{Hash, Hasher};
                    let mut hasher = ahash::AHasher::default();
                    tokens.hash(&mut hasher);
                    hasher.finish()
                };
                constructs.push(Construct {
                    id: format!("{}:{}:{}", m.file.display(), m.start.line, m.end.line),
                    file: m.file.clone(),
                    range: (m.start.line, m.end.line),
                    language: request.language.clone(),
                    kind: pattern.kind,
                    normalized_text: normalized,
                    tokens,
                    structure_hash,
                });
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "matcher stream failed while extracting constructs");
                break;
            }
        }
    }
    Ok(constructs)
}

fn hybrid_similarity(a: &Construct, b: &Construct, config: &SimilarityConfig) -> f64 {
    if a.tokens.is_empty() || b.tokens.is_empty() {
        return 0.0;
    }
    let smaller = a.byte_size().min(b.byte_size()) as f64;
    let larger = a.byte_size().max(b.byte_size()) as f64;
    if larger > 0.0 && smaller / larger < config.size_ratio_floor {
        return 0.0;
    }

    let minhash_est = if a.tokens.len() < config.small_construct_tokens
        || b.tokens.len() < config.small_construct_tokens
    {
        lcs_ratio(&a.tokens, &b.tokens)
    } else {
        let sig_a = MinHashSignature::compute(&a.tokens, config.num_perm);
        let sig_b = MinHashSignature::compute(&b.tokens, config.num_perm);
        sig_a.estimate_jaccard(&sig_b).unwrap_or(0.0)
    };

    if minhash_est < config.minhash_threshold {
        return 0.0;
    }

    let ast_sim = ast_similarity(a, b);
    let weight_sum = config.weight_minhash + config.weight_ast;
    let combined = if weight_sum > 0.0 {
        (minhash_est * config.weight_minhash + ast_sim * config.weight_ast) / weight_sum
    } else {
        minhash_est
    };
    combined.clamp(0.0, 1.0)
}

fn classify_variation(a: &Construct, b: &Construct) -> VariationClassification {
    if a.normalized_text == b.normalized_text {
        return VariationClassification::Identical;
    }
    if a.structure_hash == b.structure_hash {
        let literal_set_a: std::collections::HashSet<_> =
            a.tokens.iter().filter(|t| is_literal(t)).collect();
        let literal_set_b: std::collections::HashSet<_> =
            b.tokens.iter().filter(|t| is_literal(t)).collect();
        if literal_set_a == literal_set_b {
            return VariationClassification::IdentifierVarying;
        }
        return VariationClassification::LiteralVarying;
    }
    VariationClassification::StructuralVarying
}

fn is_literal(token: &str) -> bool {
    token.parse::<f64>().is_ok() || (token.starts_with('"') && token.ends_with('"'))
}

/// Run the full duplication-detection algorithm (spec §4.5 steps 1-6).
pub async fn find_duplication(
    matcher: &dyn Matcher,
    context: &CoreContext,
    request: FindDuplicationRequest,
) -> Result<Vec<DuplicateGroup>> {
    let constructs = extract_constructs(matcher, &request).await?;
    if constructs.len() < 2 {
        return Ok(Vec::new());
    }

    let similarity_config = context.config.similarity;

    let mut index = LshIndex::new(similarity_config.lsh_bands);
    for c in &constructs {
        let signature = context
            .signature_cache
            .get(&c.id, similarity_config.num_perm)
            .unwrap_or_else(|| {
                let sig = MinHashSignature::compute(&c.tokens, similarity_config.num_perm);
                context
                    .signature_cache
                    .put(&c.id, similarity_config.num_perm, sig.clone());
                sig
            });
        index.insert(c.id.clone(), signature);
    }

    let id_to_idx: HashMap<&str, usize> = constructs
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let mut uf = UnionFind::new(constructs.len());
    let mut pairwise_sims: HashMap<(usize, usize), f64> = HashMap::new();

    for (i, c) in constructs.iter().enumerate() {
        let candidate_ids = index.candidates(&c.id, similarity_config.minhash_threshold);
        for candidate_id in candidate_ids {
            let Some(&j) = id_to_idx.get(candidate_id.as_str()) else {
                continue;
            };
            if j <= i {
                continue;
            }
            let sim = hybrid_similarity(c, &constructs[j], &similarity_config);
            if sim >= request.min_similarity {
                uf.union(i, j);
                pairwise_sims.insert((i.min(j), i.max(j)), sim);
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..constructs.len() {
        let root = uf.find(i);
        clusters.entry(root).or_default().push(i);
    }

    let mut groups = Vec::new();
    for (root, mut members) in clusters {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|&a, &b| {
            constructs[a]
                .file
                .cmp(&constructs[b].file)
                .then(constructs[a].range.0.cmp(&constructs[b].range.0))
        });

        let instances: Vec<Construct> = members.iter().map(|&i| constructs[i].clone()).collect();
        let total_size: i64 = instances.iter().map(|c| c.byte_size() as i64).sum();
        let max_size = instances.iter().map(|c| c.byte_size() as i64).max().unwrap_or(0);
        let lines_saved_estimate = total_size - max_size;

        let mut pair_count = 0usize;
        let mut sim_sum = 0.0;
        let mut overall_variation = VariationClassification::Identical;
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let (lo, hi) = (members[a].min(members[b]), members[a].max(members[b]));
                if let Some(&sim) = pairwise_sims.get(&(lo, hi)) {
                    sim_sum += sim;
                    pair_count += 1;
                }
                let v = classify_variation(&constructs[members[a]], &constructs[members[b]]);
                overall_variation = worse_variation(overall_variation, v);
            }
        }
        let pairwise_similarity = if pair_count > 0 {
            sim_sum / pair_count as f64
        } else {
            0.0
        };

        groups.push(DuplicateGroup {
            group_id: format!("grp-{root}"),
            instances,
            representative: 0,
            pairwise_similarity,
            lines_saved_estimate,
            complexity_score: 1.0,
            variation_classification: overall_variation,
        });
    }

    groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    Ok(groups)
}

fn worse_variation(a: VariationClassification, b: VariationClassification) -> VariationClassification {
    fn rank(v: VariationClassification) -> u8 {
        match v {
            VariationClassification::Identical => 0,
            VariationClassification::LiteralVarying => 1,
            VariationClassification::IdentifierVarying => 2,
            VariationClassification::StructuralVarying => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}
