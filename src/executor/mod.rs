//! The Executor (spec §4.1): spawns the matcher subprocess and exposes its
//! stdout as a lazy, finite, non-restartable sequence of [`Match`] records.
//!
//! Production code drives a real subprocess ([`SubprocessMatcher`]); tests
//! drive a [`scripted::ScriptedMatcher`] that replays canned JSON lines so
//! the rest of the crate never needs the real matcher binary to be present.

mod caching;
mod process;
pub mod scripted;

pub use caching::CachingMatcher;
pub use process::{MatchStream, SubprocessMatcher};
pub use scripted::ScriptedMatcher;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::model::Match;

/// Parameters for one Executor invocation (spec §4.1 contract).
#[derive(Debug, Clone)]
pub struct MatchRequest {
    /// Project root; must exist and be a directory.
    pub project_root: PathBuf,
    /// A matcher pattern, or a single-document rule YAML — never wrapped in `rules:`.
    pub pattern_or_rule_yaml: String,
    /// Target language.
    pub language: String,
    /// Stop after this many matches, if set.
    pub max_results: Option<usize>,
    /// Wall-clock budget for the whole invocation.
    pub timeout: Duration,
    /// Concurrency hint forwarded to the matcher.
    pub workers: Option<usize>,
}

impl MatchRequest {
    /// Validate the input constraints from spec §4.1 before spawning anything.
    pub fn validate(&self) -> Result<()> {
        if !self.project_root.is_dir() {
            return Err(crate::core::errors::CoreError::invalid_field(
                format!(
                    "project_root does not exist or is not a directory: {}",
                    self.project_root.display()
                ),
                "project_root",
            ));
        }
        if self.pattern_or_rule_yaml.trim().is_empty() {
            return Err(crate::core::errors::CoreError::invalid_field(
                "pattern_or_rule_yaml must not be empty",
                "pattern_or_rule_yaml",
            ));
        }
        Ok(())
    }
}

/// Capability for running a matcher-shaped subprocess. Production code has
/// exactly one implementation ([`SubprocessMatcher`]); tests substitute
/// [`ScriptedMatcher`] to avoid depending on the real binary.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Run one query and return a lazily-consumed stream of matches.
    async fn run(&self, request: MatchRequest) -> Result<MatchStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn rejects_missing_project_root() {
        let req = MatchRequest {
            project_root: PathBuf::from("/does/not/exist/ever"),
            pattern_or_rule_yaml: "id: x\nlanguage: python\nrule:\n  pattern: foo".into(),
            language: "python".into(),
            max_results: None,
            timeout: Duration::from_secs(5),
            workers: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_empty_pattern() {
        let req = MatchRequest {
            project_root: Path::new(".").to_path_buf(),
            pattern_or_rule_yaml: "   ".into(),
            language: "python".into(),
            max_results: None,
            timeout: Duration::from_secs(5),
            workers: None,
        };
        assert!(req.validate().is_err());
    }
}
