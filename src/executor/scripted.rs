//! [`ScriptedMatcher`]: a test double for [`super::Matcher`] that replays a
//! fixed list of matches (or fails with a canned error) instead of spawning
//! a real subprocess. Every other component is built against the `Matcher`
//! trait so it can be exercised without the real matcher binary present.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MatchRequest, MatchStream, Matcher};
use crate::core::errors::Result;
use crate::core::model::Match;

enum Script {
    Matches(Vec<Match>),
    Fail(fn() -> crate::core::errors::CoreError),
}

/// Replays canned matches for every request, regardless of its contents.
///
/// Construct with [`ScriptedMatcher::with_matches`] for the happy path, or
/// [`ScriptedMatcher::with_error`] to exercise error handling in callers
/// without needing the real matcher binary to fail on cue.
pub struct ScriptedMatcher {
    script: Mutex<Script>,
    requests: Mutex<Vec<MatchRequest>>,
}

impl ScriptedMatcher {
    /// Every call to `run` returns a fresh stream over `matches`.
    pub fn with_matches(matches: Vec<Match>) -> Self {
        Self {
            script: Mutex::new(Script::Matches(matches)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call to `run` fails with the error returned by `make_error`.
    pub fn with_error(make_error: fn() -> crate::core::errors::CoreError) -> Self {
        Self {
            script: Mutex::new(Script::Fail(make_error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, in order, for assertions in caller tests.
    pub fn requests_seen(&self) -> Vec<MatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Matcher for ScriptedMatcher {
    async fn run(&self, request: MatchRequest) -> Result<MatchStream> {
        request.validate()?;
        self.requests.lock().unwrap().push(request);
        match &*self.script.lock().unwrap() {
            Script::Matches(matches) => Ok(MatchStream::Scripted(VecDeque::from(matches.clone()))),
            Script::Fail(make_error) => Err(make_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Position;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn sample_request() -> MatchRequest {
        MatchRequest {
            project_root: Path::new(".").to_path_buf(),
            pattern_or_rule_yaml: "id: x\nlanguage: python\nrule:\n  pattern: foo".into(),
            language: "python".into(),
            max_results: None,
            timeout: Duration::from_secs(5),
            workers: None,
        }
    }

    #[tokio::test]
    async fn replays_canned_matches() {
        let matcher = ScriptedMatcher::with_matches(vec![Match {
            file: PathBuf::from("a.py"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 2 },
            text: "x".into(),
            meta_vars: HashMap::new(),
        }]);
        let mut stream = matcher.run(sample_request()).await.unwrap();
        assert!(stream.next().await.unwrap().is_some());
        assert!(stream.next().await.unwrap().is_none());
        assert_eq!(matcher.requests_seen().len(), 1);
    }

    #[tokio::test]
    async fn replays_canned_error() {
        let matcher = ScriptedMatcher::with_error(|| {
            crate::core::errors::CoreError::matcher_timeout(5.0)
        });
        let result = matcher.run(sample_request()).await;
        assert!(result.is_err());
    }
}
