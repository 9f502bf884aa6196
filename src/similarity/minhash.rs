//! MinHash signatures and LSH banding (spec §4.4), grounded on the
//! teacher's `detectors::lsh` implementation but reworked around the
//! Construct token stream instead of a feature-extractor shingle pass.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use ahash::AHasher;
use serde::{Deserialize, Serialize};

/// Fixed-width MinHash signature computed over a construct's token stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MinHashSignature {
    /// Per-hash-function minimum token hash.
    pub values: Vec<u64>,
}

impl MinHashSignature {
    /// Compute a deterministic signature of width `num_perm` over `tokens`.
    ///
    /// Empty token streams yield an all-`u64::MAX` signature; two such
    /// signatures compare as Jaccard 1.0 (vacuously identical), so callers
    /// must apply the "empty construct -> similarity 0" edge policy
    /// (spec §4.4) themselves before trusting this estimate.
    pub fn compute(tokens: &[String], num_perm: usize) -> Self {
        let mut values = vec![u64::MAX; num_perm];
        for token in tokens {
            for (i, slot) in values.iter_mut().enumerate() {
                let hash = hash_with_seed(token, i as u64);
                if hash < *slot {
                    *slot = hash;
                }
            }
        }
        Self { values }
    }

    /// MinHash estimate of Jaccard similarity; `None` if widths differ.
    pub fn estimate_jaccard(&self, other: &Self) -> Option<f64> {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return None;
        }
        let matching = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        Some(matching as f64 / self.values.len() as f64)
    }
}

fn hash_with_seed(data: &str, seed: u64) -> u64 {
    let mut hasher = AHasher::default();
    seed.hash(&mut hasher);
    data.hash(&mut hasher);
    hasher.finish()
}

fn hash_band(band: &[u64]) -> u64 {
    let mut hasher = AHasher::default();
    for v in band {
        v.hash(&mut hasher);
    }
    hasher.finish()
}

/// LSH band index over a set of construct signatures (spec §4.4).
#[derive(Debug)]
pub struct LshIndex {
    num_bands: usize,
    bands: Vec<HashMap<u64, Vec<String>>>,
    signatures: HashMap<String, MinHashSignature>,
}

impl LshIndex {
    /// Build an empty index with `num_bands` bands. `num_perm` should be
    /// divisible by `num_bands`; a remainder is simply dropped from the
    /// last band, matching the teacher's truncating slice logic.
    pub fn new(num_bands: usize) -> Self {
        Self {
            num_bands: num_bands.max(1),
            bands: vec![HashMap::new(); num_bands.max(1)],
            signatures: HashMap::new(),
        }
    }

    /// Build an index over every `(construct_id, signature)` pair.
    pub fn build(entries: impl IntoIterator<Item = (String, MinHashSignature)>, num_bands: usize) -> Self {
        let mut index = Self::new(num_bands);
        for (id, sig) in entries {
            index.insert(id, sig);
        }
        index
    }

    /// Insert one construct's signature into the index.
    pub fn insert(&mut self, construct_id: String, signature: MinHashSignature) {
        let rows_per_band = signature.values.len() / self.num_bands;
        if rows_per_band > 0 {
            for band_idx in 0..self.num_bands {
                let start = band_idx * rows_per_band;
                let end = (start + rows_per_band).min(signature.values.len());
                if start < signature.values.len() {
                    let band_hash = hash_band(&signature.values[start..end]);
                    self.bands[band_idx]
                        .entry(band_hash)
                        .or_default()
                        .push(construct_id.clone());
                }
            }
        }
        self.signatures.insert(construct_id, signature);
    }

    /// Retrieve the (deduplicated) set of construct ids sharing at least
    /// one LSH band with `query_id`. A superset of all constructs with
    /// estimated Jaccard ≥ some implicit threshold determined by banding
    /// parameters, w.h.p. — final acceptance is left to the caller, which
    /// re-verifies with [`MinHashSignature::estimate_jaccard`] against
    /// `threshold` (spec §4.4).
    pub fn candidates(&self, query_id: &str, threshold: f64) -> Vec<String> {
        let Some(query_sig) = self.signatures.get(query_id) else {
            return Vec::new();
        };
        let rows_per_band = query_sig.values.len() / self.num_bands;
        if rows_per_band == 0 {
            return Vec::new();
        }

        let mut seen = std::collections::HashSet::new();
        for band_idx in 0..self.num_bands {
            let start = band_idx * rows_per_band;
            let end = (start + rows_per_band).min(query_sig.values.len());
            if start >= query_sig.values.len() {
                continue;
            }
            let band_hash = hash_band(&query_sig.values[start..end]);
            if let Some(bucket) = self.bands[band_idx].get(&band_hash) {
                for id in bucket {
                    if id != query_id {
                        seen.insert(id.clone());
                    }
                }
            }
        }

        seen.into_iter()
            .filter(|id| {
                self.signatures
                    .get(id)
                    .and_then(|sig| query_sig.estimate_jaccard(sig))
                    .map(|est| est >= threshold)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Number of constructs indexed.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the index holds no constructs.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Longest-common-subsequence length ratio, used in place of MinHash for
/// very small constructs where MinHash variance is unreliable (spec §4.4).
pub fn lcs_ratio(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    let lcs_len = dp[n][m] as f64;
    lcs_len / n.max(m) as f64
}
