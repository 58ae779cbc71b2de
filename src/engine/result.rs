//! Execution results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Terminal status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    Blocked,
    DryRun,
    Explain,
}

impl StepStatus {
    /// The wire form of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Blocked => "blocked",
            StepStatus::DryRun => "dry-run",
            StepStatus::Explain => "explain",
        }
    }

    /// Whether this status terminates the run.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Blocked)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured output of a plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier
    pub run_id: String,
    /// Whether every step succeeded
    pub success: bool,
    /// The first failed or blocked step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step_id: Option<String>,
    /// Per-step outcomes, in plan order
    pub steps: Vec<StepResult>,
    /// Artifact directories written by this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Structured errors, first failure only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RunError>,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step identifier
    pub id: String,
    /// Terminal status
    pub status: StepStatus,
    /// Shell exit code, when a process ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured stdout (inline)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout_ref: String,
    /// Captured stderr or error text (inline)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_ref: String,
    /// Wall-clock duration, e.g. `12ms`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    /// Human-readable step label
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Resolved command text, for display
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// What would happen, for dry-run/explain
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dry_run_info: String,
}

impl StepResult {
    /// A result for a step that was skipped after an earlier failure.
    pub fn skipped(id: impl Into<String>) -> Self {
        Self::with_status(id, StepStatus::Skipped)
    }

    pub(crate) fn with_status(id: impl Into<String>, status: StepStatus) -> Self {
        Self {
            id: id.into(),
            status,
            exit_code: None,
            stdout_ref: String::new(),
            stderr_ref: String::new(),
            duration: String::new(),
            description: String::new(),
            command: String::new(),
            dry_run_info: String::new(),
        }
    }
}
