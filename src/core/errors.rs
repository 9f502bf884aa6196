//! Error types for sgcore.
//!
//! A single crate-wide taxonomy (see spec §7) with `thiserror`-derived
//! variants and constructor helpers, in the style the rest of the crate
//! expects: components return `Result<T>` and convert collaborator
//! failures into one of these kinds rather than letting them escape raw.

use std::io;

use thiserror::Error;

/// Result type used throughout sgcore.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Crate-wide error taxonomy.
///
/// Variants correspond to the error *kinds* enumerated in spec §7, not to
/// individual failure sites. `Degradation` is intentionally never produced
/// by `From` conversions — components construct it explicitly at the one
/// or two call sites where an optional collaborator is absent.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller misuse: missing path, bad threshold, unknown language, malformed plan.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable description.
        message: String,
        /// Field or parameter name, when known.
        field: Option<String>,
    },

    /// The matcher binary could not be located on `PATH` or at the configured path.
    #[error("matcher not found: {message}")]
    MatcherNotFound {
        /// Human-readable description.
        message: String,
    },

    /// The matcher subprocess exceeded its wall-clock budget and was killed.
    #[error("matcher timed out after {timeout_secs:.3}s")]
    MatcherTimeout {
        /// Configured timeout that was exceeded.
        timeout_secs: f64,
    },

    /// The matcher exited non-zero or wrote output the Executor could not use.
    #[error("matcher error (exit {code:?}): {stderr}")]
    MatcherError {
        /// Process exit code, if the process actually exited.
        code: Option<i32>,
        /// Truncated stderr (see spec §6: at most 200 characters).
        stderr: String,
    },

    /// The matcher's dry-run probe rejected the supplied pattern or rule document.
    #[error("invalid pattern: {message}")]
    InvalidPattern {
        /// Human-readable description.
        message: String,
    },

    /// Pre- or post-write language-parse failure.
    #[error("validation failed for {path}: {message}")]
    Validation {
        /// File that failed to validate.
        path: String,
        /// Human-readable description.
        message: String,
        /// Line number, when the validator reports one.
        line: Option<usize>,
        /// Column number, when the validator reports one.
        column: Option<usize>,
    },

    /// Backup create/restore I/O failure.
    #[error("storage error: {message}")]
    Storage {
        /// Human-readable description.
        message: String,
        /// Underlying I/O error, when applicable.
        #[source]
        source: Option<io::Error>,
    },

    /// Rule id collision or a backup metadata mismatch detected on restore.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable description.
        message: String,
    },

    /// Query/signature/score cache internal failure (never raised for ordinary misses).
    #[error("cache error: {message}")]
    Cache {
        /// Human-readable description.
        message: String,
    },

    /// Truly unrecoverable internal invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },

    /// A feature is recognized but not supported in this configuration
    /// (distinct from `Degradation`: this is a caller-visible refusal).
    #[error("unsupported: {message}")]
    Unsupported {
        /// Human-readable description.
        message: String,
    },
}

impl CoreError {
    /// Caller misuse.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Caller misuse tied to a specific field/parameter.
    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Matcher binary missing.
    pub fn matcher_not_found(message: impl Into<String>) -> Self {
        Self::MatcherNotFound {
            message: message.into(),
        }
    }

    /// Matcher exceeded its timeout.
    pub fn matcher_timeout(timeout_secs: f64) -> Self {
        Self::MatcherTimeout { timeout_secs }
    }

    /// Matcher failed; truncates `stderr` to 200 chars per spec §6.
    pub fn matcher_error(code: Option<i32>, stderr: impl AsRef<str>) -> Self {
        Self::MatcherError {
            code,
            stderr: truncate_stderr(stderr.as_ref()),
        }
    }

    /// Matcher rejected the pattern during its dry-run probe.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Pre/post-write validation failure.
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Pre/post-write validation failure with a location.
    pub fn validation_at(
        path: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Backup/restore I/O failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Backup/restore I/O failure with the underlying cause.
    pub fn storage_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Rule id collision / concurrent-modification conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Cache internal failure.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Unrecoverable internal invariant violation.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Recognized-but-unsupported request.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

/// Truncate matcher stderr to at most 200 characters, per spec §6.
pub fn truncate_stderr(stderr: &str) -> String {
    const MAX: usize = 200;
    if stderr.len() <= MAX {
        stderr.to_string()
    } else {
        let mut end = MAX;
        while !stderr.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &stderr[..end])
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        Self::storage_io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON (de)serialization failed: {err}"),
        }
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Internal {
            message: format!("YAML (de)serialization failed: {err}"),
        }
    }
}

/// Extension trait for attaching static context to a failing result.
pub trait ResultExt<T> {
    /// Wrap the error (if any) with additional static context.
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CoreError>,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            CoreError::Internal {
                message: format!("{msg}: {inner}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_stderr() {
        let long = "x".repeat(500);
        let err = CoreError::matcher_error(Some(2), &long);
        match err {
            CoreError::MatcherError { stderr, .. } => {
                assert!(stderr.chars().count() <= 201);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn short_stderr_unchanged() {
        let err = CoreError::matcher_error(Some(1), "boom");
        match err {
            CoreError::MatcherError { stderr, .. } => assert_eq!(stderr, "boom"),
            _ => panic!("wrong variant"),
        }
    }
}
