//! File Gate (spec §4.3): pure computation over the filesystem plus config
//! that produces the set of files eligible for a given analysis.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::warn;

use crate::core::config::FileGateConfig;
use crate::core::errors::{CoreError, Result};

/// Maps a language name to the file extensions it claims.
fn extensions_for_language(language: &str) -> &'static [&'static str] {
    match language {
        "python" => &["py", "pyi"],
        "javascript" => &["js", "jsx", "mjs", "cjs"],
        "typescript" => &["ts", "tsx"],
        "rust" => &["rs"],
        "go" => &["go"],
        "java" => &["java"],
        _ => &[],
    }
}

/// Input parameters for one gate evaluation.
#[derive(Debug, Clone)]
pub struct GateRequest {
    /// Root of the project to scan.
    pub project_root: PathBuf,
    /// Target language; determines the extension filter.
    pub language: String,
    /// Only files matching at least one of these globs are kept, if non-empty.
    pub include_globs: Vec<String>,
    /// Files matching any of these globs are dropped.
    pub exclude_globs: Vec<String>,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CoreError::invalid_input(format!("invalid glob `{pattern}`: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CoreError::invalid_input(format!("failed to build globset: {e}")))
}

/// Produce the ordered, deterministic list of eligible absolute paths.
///
/// Output order is stable across runs: lexicographic over canonicalized
/// paths (spec §4.3). Unreadable files are logged and skipped; an empty
/// result is a valid, non-error outcome.
pub fn eligible_files(request: &GateRequest, config: &FileGateConfig) -> Result<Vec<PathBuf>> {
    let extensions = extensions_for_language(&request.language);
    let include_set = build_globset(&request.include_globs)?;
    let exclude_set = build_globset(&request.exclude_globs)?;
    let has_includes = !request.include_globs.is_empty();

    let mut out = Vec::new();
    let mut walker = WalkBuilder::new(&request.project_root);
    walker.hidden(false).git_ignore(true).follow_links(false);

    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry during file gate scan");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();

        if is_within_default_excluded_dir(path, &request.project_root, config) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.is_empty() && !extensions.contains(&ext) {
            continue;
        }

        let relative = path
            .strip_prefix(&request.project_root)
            .unwrap_or(path)
            .to_path_buf();

        if has_includes && !include_set.is_match(&relative) {
            continue;
        }
        if exclude_set.is_match(&relative) {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file during file gate scan");
                continue;
            }
        };
        if metadata.len() > config.max_file_size_bytes {
            continue;
        }

        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        out.push(canonical);
    }

    out.sort();
    out.dedup();
    Ok(out)
}

fn is_within_default_excluded_dir(
    path: &Path,
    project_root: &Path,
    config: &FileGateConfig,
) -> bool {
    path.strip_prefix(project_root)
        .unwrap_or(path)
        .components()
        .any(|c| {
            let name = c.as_os_str().to_string_lossy();
            config
                .default_excluded_dirs
                .iter()
                .any(|excluded| excluded == name.as_ref())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn filters_by_extension_and_excluded_dir() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a.py"), "x = 1\n");
        write(&dir.path().join("node_modules/b.py"), "y = 2\n");
        write(&dir.path().join("c.js"), "let x = 1;\n");

        let request = GateRequest {
            project_root: dir.path().to_path_buf(),
            language: "python".into(),
            include_globs: vec![],
            exclude_globs: vec![],
        };
        let files = eligible_files(&request, &FileGateConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.py"));
    }

    #[test]
    fn respects_max_file_size() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("big.py"), &"x".repeat(20));

        let request = GateRequest {
            project_root: dir.path().to_path_buf(),
            language: "python".into(),
            include_globs: vec![],
            exclude_globs: vec![],
        };
        let mut config = FileGateConfig::default();
        config.max_file_size_bytes = 10;
        let files = eligible_files(&request, &config).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn exclude_glob_wins_over_include_glob() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("keep.py"), "x = 1\n");
        write(&dir.path().join("skip_test.py"), "x = 1\n");

        let request = GateRequest {
            project_root: dir.path().to_path_buf(),
            language: "python".into(),
            include_globs: vec!["*.py".into()],
            exclude_globs: vec!["*_test.py".into()],
        };
        let files = eligible_files(&request, &FileGateConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.py"));
    }

    #[test]
    fn output_order_is_deterministic() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("z.py"), "1");
        write(&dir.path().join("a.py"), "1");
        let request = GateRequest {
            project_root: dir.path().to_path_buf(),
            language: "python".into(),
            include_globs: vec![],
            exclude_globs: vec![],
        };
        let files = eligible_files(&request, &FileGateConfig::default()).unwrap();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }
}
