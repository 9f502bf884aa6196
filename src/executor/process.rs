//! Subprocess-backed [`Matcher`] implementation and the [`MatchStream`]
//! state machine described in spec §4.1:
//!
//! `idle -> spawned -> streaming -> (consumed-all | early-terminated |
//! timed-out | errored) -> cleaned-up`
//!
//! Dropping a [`MatchStream`] always terminates the child — the single most
//! important RAII discipline in the system (spec §9).

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

use super::{MatchRequest, Matcher};
use crate::core::errors::{CoreError, Result};
use crate::core::model::{Match, Position};

/// Drives the real matcher binary as a subprocess.
#[derive(Debug, Clone)]
pub struct SubprocessMatcher {
    binary: PathBuf,
}

impl SubprocessMatcher {
    /// Build a matcher that invokes `binary` (resolved against `PATH` if relative).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Spawn the dry-run probe; a non-zero exit means the matcher rejected
    /// the pattern before any real work started (spec §4.1 `InvalidPattern`).
    async fn probe(&self, request: &MatchRequest) -> Result<()> {
        let mut cmd = self.base_command(request, true);
        let mut child = cmd.spawn().map_err(|e| {
            CoreError::matcher_not_found(format!(
                "failed to spawn matcher binary {}: {e}",
                self.binary.display()
            ))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.pattern_or_rule_yaml.as_bytes())
                .await
                .map_err(|e| CoreError::storage_io("failed writing to matcher stdin", e))?;
        }

        let output = tokio_timeout(request.timeout, child.wait_with_output())
            .await
            .map_err(|_| CoreError::matcher_timeout(request.timeout.as_secs_f64()))?
            .map_err(|e| CoreError::storage_io("failed waiting on matcher probe", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::invalid_pattern(format!(
                "matcher rejected pattern during dry-run probe: {}",
                crate::core::errors::truncate_stderr(&stderr)
            )));
        }
        Ok(())
    }

    fn base_command(&self, request: &MatchRequest, dry_run: bool) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&request.project_root)
            .arg("scan")
            .arg("--rule")
            .arg("-")
            .arg("--lang")
            .arg(&request.language)
            .arg("--json=stream");
        if dry_run {
            cmd.arg("--dry-run");
        }
        if let Some(workers) = request.workers {
            cmd.arg("--threads").arg(workers.to_string());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Matcher for SubprocessMatcher {
    async fn run(&self, request: MatchRequest) -> Result<MatchStream> {
        request.validate()?;
        self.probe(&request).await?;

        let mut cmd = self.base_command(&request, false);
        let mut child = cmd.spawn().map_err(|e| {
            CoreError::matcher_not_found(format!(
                "failed to spawn matcher binary {}: {e}",
                self.binary.display()
            ))
        })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::internal("matcher child had no stdout pipe"))?;
        let stderr = child.stderr.take();

        if let Some(mut stdin) = stdin {
            stdin
                .write_all(request.pattern_or_rule_yaml.as_bytes())
                .await
                .map_err(|e| CoreError::storage_io("failed writing to matcher stdin", e))?;
            drop(stdin);
        }

        debug!(project_root = %request.project_root.display(), language = %request.language, "matcher spawned, streaming");

        let lines = BufReader::new(stdout).lines();
        Ok(MatchStream::Process(ProcessStream {
            child: Some(child),
            lines,
            stderr,
            deadline: Instant::now() + request.timeout,
            max_results: request.max_results,
            emitted: 0,
            project_root: request.project_root,
            terminate_grace: Duration::from_secs(5),
            state: StreamState::Streaming,
        }))
    }
}

/// Wire format emitted by the matcher, one JSON object per line (spec §6).
#[derive(Debug, Deserialize)]
struct WireMatch {
    file: String,
    range: WireRange,
    text: String,
    #[serde(default)]
    meta_variables: Option<WireMetaVariables>,
}

#[derive(Debug, Deserialize)]
struct WireRange {
    start: WirePos,
    end: WirePos,
}

#[derive(Debug, Deserialize)]
struct WirePos {
    line: usize,
    column: usize,
}

#[derive(Debug, Deserialize)]
struct WireMetaVariables {
    #[serde(default)]
    single: HashMap<String, WireCapture>,
}

#[derive(Debug, Deserialize)]
struct WireCapture {
    text: String,
}

fn convert(project_root: &Path, wire: WireMatch) -> Match {
    let file = project_root.join(&wire.file);
    let meta_vars = wire
        .meta_variables
        .map(|mv| {
            mv.single
                .into_iter()
                .map(|(k, v)| (k, v.text))
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    Match {
        file,
        start: Position {
            line: wire.range.start.line,
            column: wire.range.start.column,
        },
        end: Position {
            line: wire.range.end.line,
            column: wire.range.end.column,
        },
        text: wire.text,
        meta_vars,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Done,
}

/// A process-backed stream of matches, owning the subprocess end to end.
pub struct ProcessStream {
    child: Option<Child>,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: Option<ChildStderr>,
    deadline: Instant,
    max_results: Option<usize>,
    emitted: usize,
    project_root: PathBuf,
    terminate_grace: Duration,
    state: StreamState,
}

impl ProcessStream {
    async fn next(&mut self) -> Result<Option<Match>> {
        if self.state == StreamState::Done {
            return Ok(None);
        }
        if let Some(max) = self.max_results {
            if self.emitted >= max {
                self.terminate().await;
                return Ok(None);
            }
        }

        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.terminate().await;
                return Err(CoreError::matcher_timeout(0.0));
            }

            let line = match tokio_timeout(remaining, self.lines.next_line()).await {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => {
                    self.terminate().await;
                    return Err(CoreError::storage_io("failed reading matcher stdout", e));
                }
                Err(_) => {
                    self.terminate().await;
                    return Err(CoreError::matcher_timeout(0.0));
                }
            };

            let Some(line) = line else {
                return self.finish_on_eof().await;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<WireMatch>(trimmed) {
                Ok(wire) => {
                    self.emitted += 1;
                    return Ok(Some(convert(&self.project_root, wire)));
                }
                Err(e) => {
                    // Malformed lines are logged and skipped, never fail the whole query.
                    warn!(error = %e, line = %trimmed, "skipping malformed matcher output line");
                    continue;
                }
            }
        }
    }

    async fn finish_on_eof(&mut self) -> Result<Option<Match>> {
        self.state = StreamState::Done;
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .await
                .map_err(|e| CoreError::storage_io("failed waiting on matcher exit", e))?;
            if !status.success() {
                let stderr = self.drain_stderr().await;
                return Err(CoreError::matcher_error(status.code(), stderr));
            }
        }
        Ok(None)
    }

    /// Consumer-driven early termination: signal the child and drain
    /// remaining output with a short budget (spec §4.1).
    async fn terminate(&mut self) {
        if self.state == StreamState::Done {
            return;
        }
        self.state = StreamState::Done;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = tokio_timeout(self.terminate_grace, child.wait()).await;
        }
    }

    async fn drain_stderr(&mut self) -> String {
        use tokio::io::AsyncReadExt;
        if let Some(mut stderr) = self.stderr.take() {
            let mut buf = String::new();
            let _ =
                tokio_timeout(Duration::from_millis(500), stderr.read_to_string(&mut buf)).await;
            buf
        } else {
            String::new()
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Drop cannot await; start_kill() is non-blocking and guarantees
            // the process receives SIGKILL even if nothing ever reaps it.
            let _ = child.start_kill();
        }
    }
}

/// Lazily-consumed sequence of [`Match`] records.
///
/// Either backed by a live subprocess ([`ProcessStream`]) or, in tests, by a
/// fixed list of canned matches. Dropping either variant terminates the
/// underlying child, if any.
pub enum MatchStream {
    /// Backed by a running matcher subprocess.
    Process(ProcessStream),
    /// Backed by a fixed list of canned matches (see [`super::ScriptedMatcher`]).
    Scripted(VecDeque<Match>),
}

impl MatchStream {
    /// Pull the next match, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Result<Option<Match>> {
        match self {
            MatchStream::Process(p) => p.next().await,
            MatchStream::Scripted(queue) => Ok(queue.pop_front()),
        }
    }

    /// Consumer-driven early termination.
    pub async fn terminate(&mut self) {
        if let MatchStream::Process(p) = self {
            p.terminate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_maps_wire_fields() {
        let wire = WireMatch {
            file: "a.py".into(),
            range: WireRange {
                start: WirePos { line: 1, column: 1 },
                end: WirePos { line: 1, column: 9 },
            },
            text: "x = 1".into(),
            meta_variables: Some(WireMetaVariables {
                single: HashMap::from([("NAME".to_string(), WireCapture { text: "x".into() })]),
            }),
        };
        let m = convert(Path::new("/proj"), wire);
        assert_eq!(m.file, Path::new("/proj/a.py"));
        assert_eq!(m.meta_vars.get("NAME").map(String::as_str), Some("x"));
    }

    #[tokio::test]
    async fn scripted_stream_yields_then_ends() {
        let mut stream = MatchStream::Scripted(VecDeque::from(vec![Match {
            file: PathBuf::from("/a.py"),
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 2 },
            text: "x".into(),
            meta_vars: HashMap::new(),
        }]));
        assert!(stream.next().await.unwrap().is_some());
        assert!(stream.next().await.unwrap().is_none());
    }
}
