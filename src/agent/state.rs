//! Agent lifecycle state and run reports

use std::fmt;

use serde::Serialize;

use crate::core::BridgeError;
use crate::runtime::{RunResult, Termination};

/// Published lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Running,
    Error(String),
}

impl AgentState {
    pub fn is_running(&self) -> bool {
        matches!(self, AgentState::Running)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AgentState::Error(_))
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Running => write!(f, "running"),
            AgentState::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// What a finished run left behind
///
/// `summary` is the short line meant for the user; the raw streams are kept
/// for anyone who asks for details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub succeeded: bool,
    pub summary: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the runtime never started
    pub exit_code: Option<i32>,
    pub termination: Option<Termination>,
}

impl RunReport {
    pub(crate) fn from_result(run_id: u64, result: &RunResult) -> Self {
        Self {
            run_id,
            succeeded: result.succeeded,
            summary: result.summary(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: Some(result.exit_code),
            termination: Some(result.termination),
        }
    }

    pub(crate) fn from_error(run_id: u64, error: &BridgeError) -> Self {
        Self {
            run_id,
            succeeded: false,
            summary: error.to_string(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            termination: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(AgentState::Idle.to_string(), "idle");
        assert_eq!(
            AgentState::Error("quota exceeded".to_string()).to_string(),
            "error: quota exceeded"
        );
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_value(AgentState::Error("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "error", "message": "boom"}));
    }

    #[test]
    fn test_report_from_launch_error() {
        let err = BridgeError::launch("python3", "not found");
        let report = RunReport::from_error(4, &err);
        assert_eq!(report.exit_code, None);
        assert_eq!(report.termination, None);
        assert!(report.summary.contains("python3"));
    }
}
