//! Lightweight per-language content validators (spec §4.8/§6): cheap,
//! dependency-free sanity checks run before and after a write, not full
//! parsers. Brace/indent balance only — good enough to catch a malformed
//! plan before it touches disk.

use std::path::Path;

use crate::core::errors::{CoreError, Result};

/// Validate `content` against `language`'s lightweight grammar check.
pub fn validate_content(language: &str, path: &Path, content: &str) -> Result<()> {
    match language {
        "python" => validate_python_indent(path, content),
        "javascript" | "typescript" | "rust" | "go" | "java" => validate_brace_balance(path, content),
        _ => Ok(()),
    }
}

fn validate_brace_balance(path: &Path, content: &str) -> Result<()> {
    let mut depth: i64 = 0;
    for (line_no, line) in content.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(CoreError::validation_at(
                    path.display().to_string(),
                    "unbalanced closing brace",
                    line_no + 1,
                    1,
                ));
            }
        }
    }
    if depth != 0 {
        return Err(CoreError::validation(
            path.display().to_string(),
            format!("unbalanced braces: depth {depth} at end of file"),
        ));
    }
    Ok(())
}

fn validate_python_indent(path: &Path, content: &str) -> Result<()> {
    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.contains('\t') && trimmed.contains("    ") {
            return Err(CoreError::validation_at(
                path.display().to_string(),
                "mixed tabs and spaces in indentation",
                line_no + 1,
                1,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_js_braces_pass() {
        assert!(validate_content("javascript", Path::new("a.js"), "function f() {\n  return 1;\n}\n").is_ok());
    }

    #[test]
    fn unbalanced_braces_fail() {
        assert!(validate_content("javascript", Path::new("a.js"), "function f() {\n  return 1;\n").is_err());
    }

    #[test]
    fn python_skips_brace_check() {
        assert!(validate_content("python", Path::new("a.py"), "def f():\n    return {1: 2}\n").is_ok());
    }
}
