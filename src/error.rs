//! Structured run errors.
//!
//! Every failure surfaced to a caller is a [`RunError`]: a typed,
//! serializable envelope with an optional remediation hint, suitable
//! for machine consumption alongside human display.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "PRECONDITION_FAILED")]
    PreconditionFailed,
    #[serde(rename = "TOOL_NOT_FOUND")]
    ToolNotFound,
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,
    #[serde(rename = "TRANSIENT")]
    Transient,
    #[serde(rename = "STEP_FAILED")]
    StepFailed,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "SIDE_EFFECT_BLOCKED")]
    SideEffectBlocked,
}

impl ErrorType {
    /// The wire tag for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Validation => "VALIDATION_ERROR",
            ErrorType::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorType::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorType::PermissionDenied => "PERMISSION_DENIED",
            ErrorType::Transient => "TRANSIENT",
            ErrorType::StepFailed => "STEP_FAILED",
            ErrorType::Timeout => "TIMEOUT",
            ErrorType::Cancelled => "CANCELLED",
            ErrorType::SideEffectBlocked => "SIDE_EFFECT_BLOCKED",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error for agent consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Error category
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Optional machine-readable sub-code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Step this error is attributed to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Advisory flag; no layer performs retries
    pub retryable: bool,
    /// Suggested remediation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl RunError {
    /// Create an error of the given category.
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            code: None,
            message: message.into(),
            step_id: None,
            retryable: false,
            hint: None,
        }
    }

    /// Create a `VALIDATION_ERROR`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Validation, message)
    }

    /// Create a `TOOL_NOT_FOUND` error.
    pub fn tool_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ToolNotFound, message)
    }

    /// Create a `STEP_FAILED` error attributed to a step.
    pub fn step_failed(
        step_id: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(ErrorType::StepFailed, message).with_step(step_id).with_hint(hint)
    }

    /// Create a `SIDE_EFFECT_BLOCKED` error attributed to a step.
    pub fn side_effect_blocked(
        step_id: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(ErrorType::SideEffectBlocked, message).with_step(step_id).with_hint(hint)
    }

    /// Attach the offending step ID.
    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step_id {
            Some(id) => write!(f, "[{}] step {}: {}", self.error_type, id, self.message),
            None => write!(f, "[{}] {}", self.error_type, self.message),
        }
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_step() {
        let err = RunError::step_failed("deploy", "exit code 1", "check logs");
        assert_eq!(err.to_string(), "[STEP_FAILED] step deploy: exit code 1");
    }

    #[test]
    fn test_display_without_step() {
        let err = RunError::validation("plan has no steps");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] plan has no steps");
    }

    #[test]
    fn test_serializes_wire_tags() {
        let err = RunError::side_effect_blocked("rm", "destructive", "re-run with --approve");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"SIDE_EFFECT_BLOCKED\""));
        assert!(json.contains("\"step_id\":\"rm\""));
        assert!(json.contains("\"retryable\":false"));
    }

    #[test]
    fn test_omits_empty_optional_fields() {
        let err = RunError::validation("bad");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("hint"));
        assert!(!json.contains("step_id"));
        assert!(!json.contains("code"));
    }
}
