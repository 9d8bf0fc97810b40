//! Run results and their classification

use std::fmt;
use std::time::Duration;

use crate::script::{ERROR_MARKER, SUCCESS_MARKER};

/// Longest summary shown as a primary message; raw output stays in the result
const SUMMARY_LIMIT: usize = 240;

/// How a subprocess run came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own
    Exited,
    /// The process was killed after exceeding its time allowance
    TimedOut { after: Duration },
    /// The process was killed because the caller cancelled the run
    Cancelled,
}

/// Outcome of one subprocess execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, -1 when killed or terminated by a signal
    pub exit_code: i32,
    /// Exit code 0 and stderr empty. Not even whitespace is allowed, so a
    /// script that only prints a blank line to stderr fails.
    pub succeeded: bool,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Terminal marker line printed by a generated script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Success(String),
    Error(String),
}

/// Why a run did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// Exceeded its time allowance
    Timeout { after: Duration },
    /// Killed on request
    Cancelled,
    /// Exited non-zero with an `ERROR:` line
    Script(String),
    /// Failed without a recognised marker; carries the combined raw output
    Unknown(String),
}

impl RunResult {
    /// Result of a process that exited by itself
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stdout = stdout.into();
        let stderr = stderr.into();
        let succeeded = exit_code == 0 && stderr.is_empty();
        Self {
            stdout,
            stderr,
            exit_code,
            succeeded,
            termination: Termination::Exited,
            elapsed: Duration::ZERO,
        }
        .with_diagnostic()
    }

    /// Result of a process killed at its deadline, with the output captured so far
    pub fn timed_out(after: Duration, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: -1,
            succeeded: false,
            termination: Termination::TimedOut { after },
            elapsed: after,
        }
        .with_diagnostic()
    }

    /// Result of a process whose exit status could not be collected
    pub fn lost(reason: impl Into<String>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let mut stderr = stderr.into();
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&reason.into());
        Self {
            stdout: stdout.into(),
            stderr,
            exit_code: -1,
            succeeded: false,
            termination: Termination::Exited,
            elapsed: Duration::ZERO,
        }
    }

    /// Result of a process killed by cancellation
    pub fn cancelled(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: -1,
            succeeded: false,
            termination: Termination::Cancelled,
            elapsed: Duration::ZERO,
        }
        .with_diagnostic()
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// A failed result never comes back with both streams empty
    fn with_diagnostic(mut self) -> Self {
        if !self.succeeded && self.stdout.trim().is_empty() && self.stderr.trim().is_empty() {
            self.stderr = match self.termination {
                Termination::Exited => format!(
                    "process exited with status {} without output",
                    self.exit_code
                ),
                Termination::TimedOut { after } => {
                    format!("process timed out after {}s without output", after.as_secs())
                }
                Termination::Cancelled => "process cancelled before producing output".to_string(),
            };
        }
        self
    }

    /// Last terminal marker, looked up on stdout first, then stderr
    pub fn marker(&self) -> Option<Marker> {
        last_marker(&self.stdout).or_else(|| last_marker(&self.stderr))
    }

    /// Both streams joined, stdout first
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// Classification of a failed run, `None` on success
    pub fn failure(&self) -> Option<RunFailure> {
        if self.succeeded {
            return None;
        }
        Some(match self.termination {
            Termination::TimedOut { after } => RunFailure::Timeout { after },
            Termination::Cancelled => RunFailure::Cancelled,
            Termination::Exited => match self.marker() {
                Some(Marker::Error(message)) if self.exit_code != 0 => RunFailure::Script(message),
                _ => RunFailure::Unknown(self.combined_output()),
            },
        })
    }

    /// Text a successful run reports back: the `SUCCESS:` payload or all of stdout
    pub fn output_text(&self) -> String {
        match last_marker(&self.stdout) {
            Some(Marker::Success(text)) => text,
            _ => self.stdout.trim().to_string(),
        }
    }

    /// Short user-facing line describing the run
    pub fn summary(&self) -> String {
        match self.failure() {
            None => self.output_text(),
            Some(failure) => failure.summary(),
        }
    }
}

impl RunFailure {
    /// Short message suitable for a status line
    pub fn summary(&self) -> String {
        match self {
            RunFailure::Timeout { after } => format!("timed out after {}s", after.as_secs()),
            RunFailure::Cancelled => "cancelled".to_string(),
            RunFailure::Script(message) => message.clone(),
            RunFailure::Unknown(raw) => {
                let last = raw
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or("run failed");
                truncate(last, SUMMARY_LIMIT)
            }
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

fn last_marker(text: &str) -> Option<Marker> {
    text.lines().rev().map(str::trim).find_map(|line| {
        if let Some(rest) = line.strip_prefix(SUCCESS_MARKER) {
            Some(Marker::Success(rest.trim().to_string()))
        } else {
            line.strip_prefix(ERROR_MARKER)
                .map(|rest| Marker::Error(rest.trim().to_string()))
        }
    })
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push('…');
    cut
}
