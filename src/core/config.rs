//! Configuration types for sgcore, mirroring the teacher crate's
//! `ValknutConfig` (one struct per component, all `serde` + `Default`,
//! aggregated under a single top-level config with YAML load/save).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{CoreError, Result};

/// Aggregate configuration for every component. Loadable from/savable to YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Executor (C1) settings.
    pub executor: ExecutorConfig,
    /// Query Cache (C2) settings.
    pub cache: CacheConfig,
    /// File Gate (C3) settings.
    pub file_gate: FileGateConfig,
    /// Similarity Kernel (C4) settings.
    pub similarity: SimilarityConfig,
    /// Ranker (C6) settings.
    pub ranking: RankingConfig,
    /// Rule Engine (C7) settings.
    pub rule_engine: RuleEngineConfig,
    /// Refactor Orchestrator (C8) settings.
    pub refactor: RefactorConfig,
    /// Backup Store (C9) settings.
    pub backup: BackupConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            cache: CacheConfig::default(),
            file_gate: FileGateConfig::default(),
            similarity: SimilarityConfig::default(),
            ranking: RankingConfig::default(),
            rule_engine: RuleEngineConfig::default(),
            refactor: RefactorConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::storage_io(format!("failed to read config file {}", path.display()), e)
        })?;
        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| {
            CoreError::storage_io(format!("failed to write config file {}", path.display()), e)
        })
    }
}

/// Settings for the Executor (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Path to the matcher binary; resolved against `PATH` if not absolute.
    pub matcher_binary: String,
    /// Default wall-clock timeout in seconds.
    pub timeout_secs: f64,
    /// Grace period granted after SIGTERM before SIGKILL, in seconds.
    pub terminate_grace_secs: f64,
    /// Concurrency hint forwarded to the matcher (`--threads`); `None` lets the matcher decide.
    pub workers: Option<usize>,
    /// Custom language-name overrides beyond the built-in fixed set.
    pub custom_languages: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            matcher_binary: "ast-grep".to_string(),
            timeout_secs: 30.0,
            terminate_grace_secs: 5.0,
            workers: None,
            custom_languages: HashMap::new(),
        }
    }
}

/// Settings for the Query Cache (C2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries retained (LRU eviction beyond this).
    pub max_size: usize,
    /// Entry time-to-live, in seconds.
    pub ttl_seconds: u64,
    /// Process-global bypass switch.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            ttl_seconds: 300,
            enabled: true,
        }
    }
}

/// Settings for the File Gate (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileGateConfig {
    /// Directory names excluded by default, regardless of include/exclude globs.
    pub default_excluded_dirs: Vec<String>,
    /// Maximum file size, in bytes, eligible for analysis.
    pub max_file_size_bytes: u64,
}

impl Default for FileGateConfig {
    fn default() -> Self {
        Self {
            default_excluded_dirs: [
                "node_modules",
                "__pycache__",
                ".git",
                "dist",
                "build",
                ".venv",
                "venv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_size_bytes: 1_000_000,
        }
    }
}

/// Settings for the Similarity Kernel (C4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// MinHash signature width.
    pub num_perm: usize,
    /// LSH band count (`num_perm` must be divisible by this).
    pub lsh_bands: usize,
    /// Stage-1 (MinHash) acceptance threshold; pairs below this are short-circuited.
    pub minhash_threshold: f64,
    /// Weight given to the MinHash estimate in the hybrid similarity.
    pub weight_minhash: f64,
    /// Weight given to the AST/structure stage.
    pub weight_ast: f64,
    /// Weight given to the optional semantic stage (ignored/renormalized to 0 if unavailable).
    pub weight_semantic: f64,
    /// Token-count threshold below which LCS ratio replaces MinHash for small constructs.
    pub small_construct_tokens: usize,
    /// Minimum ratio of smaller/larger byte size for a pair to be considered (spec §3 invariant 2).
    pub size_ratio_floor: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            num_perm: 128,
            lsh_bands: 32,
            minhash_threshold: 0.5,
            weight_minhash: 0.5,
            weight_ast: 0.5,
            weight_semantic: 0.0,
            small_construct_tokens: 12,
            size_ratio_floor: 0.8,
        }
    }
}

/// Settings for the Ranker (C6). Weights are invariants (spec §3.3); kept
/// configurable only so tests can probe sensitivity, defaults must not drift.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Weight of the savings component.
    pub weight_savings: f64,
    /// Weight of the complexity component.
    pub weight_complexity: f64,
    /// Weight of the risk component.
    pub weight_risk: f64,
    /// Weight of the effort component.
    pub weight_effort: f64,
    /// Score cache capacity.
    pub cache_size: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weight_savings: 0.40,
            weight_complexity: 0.20,
            weight_risk: 0.25,
            weight_effort: 0.15,
            cache_size: 1024,
        }
    }
}

/// Settings for the Rule Engine (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEngineConfig {
    /// Directory (relative to a project root) holding custom rule YAML files.
    pub rule_dir_name: String,
    /// Worker pool size for parallel rule execution.
    pub parallelism: usize,
    /// Default `max_violations` guard (0 = unlimited).
    pub max_violations: usize,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            rule_dir_name: ".ast-grep-rules".to_string(),
            parallelism: 4,
            max_violations: 0,
        }
    }
}

/// Settings for the Refactor Orchestrator (C8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefactorConfig {
    /// Whether `apply` defaults to dry-run when the caller doesn't specify.
    pub default_dry_run: bool,
    /// Whether `apply` snapshots a backup by default.
    pub default_create_backup: bool,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            default_dry_run: true,
            default_create_backup: true,
        }
    }
}

/// Settings for the Backup Store (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory (relative to a project root, unless absolute) holding backups.
    pub backups_dir_name: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backups_dir_name: ".ast-grep-backups".to_string(),
        }
    }
}

impl BackupConfig {
    /// Resolve the backups root for a given project root.
    pub fn resolve_root(&self, project_root: &Path) -> PathBuf {
        let configured = PathBuf::from(&self.backups_dir_name);
        if configured.is_absolute() {
            configured
        } else {
            project_root.join(configured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_weights_sum_to_one() {
        let cfg = RankingConfig::default();
        let sum = cfg.weight_savings + cfg.weight_complexity + cfg.weight_risk + cfg.weight_effort;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn roundtrips_through_yaml() {
        let cfg = CoreConfig::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.cache.max_size, cfg.cache.max_size);
    }

    #[test]
    fn resolves_relative_backup_root() {
        let cfg = BackupConfig::default();
        let root = cfg.resolve_root(Path::new("/proj"));
        assert_eq!(root, PathBuf::from("/proj/.ast-grep-backups"));
    }
}
