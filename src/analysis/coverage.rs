//! Test-coverage probe (spec §4.10 step 3): a deterministic, dependency-free
//! heuristic over naming convention rather than a real coverage-tool
//! integration, which is out of scope (spec Non-goals).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Candidate test-file naming conventions checked relative to the project root.
fn candidate_test_paths(project_root: &Path, file: &Path) -> Vec<PathBuf> {
    let relative = file.strip_prefix(project_root).unwrap_or(file);
    let stem = relative.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = relative.extension().and_then(|s| s.to_str()).unwrap_or("");
    let parent = relative.parent().unwrap_or_else(|| Path::new(""));

    let mut candidates = Vec::new();
    for (dir, name_fn): (&str, fn(&str) -> String) in [
        ("tests", |s: &str| format!("test_{s}")),
        ("test", |s: &str| format!("{s}_test")),
        ("__tests__", |s: &str| format!("{s}.test")),
    ] {
        let file_name = if ext.is_empty() {
            name_fn(stem)
        } else {
            format!("{}.{ext}", name_fn(stem))
        };
        candidates.push(project_root.join(parent).join(dir).join(&file_name));
        candidates.push(project_root.join(dir).join(parent).join(&file_name));
    }
    candidates
}

/// Probe each file in `files` for an associated test file on disk, returning
/// a coarse coverage percentage: 100.0 when a matching test file exists,
/// 0.0 otherwise. One pass, deduplicated (spec §4.10 step 3).
pub fn probe_test_coverage(project_root: &Path, files: &[PathBuf]) -> HashMap<PathBuf, f64> {
    let mut result = HashMap::new();
    for file in files {
        let has_test = candidate_test_paths(project_root, file).iter().any(|p| p.exists());
        result.insert(file.clone(), if has_test { 100.0 } else { 0.0 });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_coverage_via_tests_directory_convention() {
        let project = tempdir().unwrap();
        let src = project.path().join("a.py");
        std::fs::write(&src, "def f(): pass\n").unwrap();
        std::fs::create_dir_all(project.path().join("tests")).unwrap();
        std::fs::write(project.path().join("tests/test_a.py"), "def test_f(): pass\n").unwrap();

        let result = probe_test_coverage(project.path(), &[src.clone()]);
        assert_eq!(result.get(&src).copied(), Some(100.0));
    }

    #[test]
    fn reports_zero_coverage_without_a_matching_test_file() {
        let project = tempdir().unwrap();
        let src = project.path().join("b.py");
        std::fs::write(&src, "def g(): pass\n").unwrap();

        let result = probe_test_coverage(project.path(), &[src.clone()]);
        assert_eq!(result.get(&src).copied(), Some(0.0));
    }
}
