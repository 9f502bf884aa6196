//! Loader for on-disk custom rules (spec §6): one rule per YAML file under
//! a project-local directory (default `.ast-grep-rules`). Malformed files
//! are logged and skipped; one bad file never fails the whole load.

use std::path::Path;

use tracing::warn;

use crate::core::errors::Result;
use crate::core::model::Rule;

/// Load every `*.yaml`/`*.yml` file directly under `dir` as a single Rule.
pub fn load_custom_rules(dir: &Path) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    let entries = std::fs::read_dir(dir)?;
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable custom rule file");
                continue;
            }
        };
        match serde_yaml::from_str::<Rule>(&content) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed custom rule file");
            }
        }
    }
    Ok(rules)
}
