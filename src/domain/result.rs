//! Per-stage results.
//!
//! A document holds at most one `StageResult` per stage. Results move
//! `idle -> loading -> (success | error)`; terminal results go back to
//! `loading` only through an explicit retry or resume.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::StagePayload;
use super::stage::Stage;

/// Latest outcome of one stage for one document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageResult {
    /// Not started
    #[default]
    Idle,

    /// Executor is waiting on its collaborator
    Loading { started_at: DateTime<Utc> },

    /// Completed with a payload
    Success {
        payload: StagePayload,
        produced_at: DateTime<Utc>,
    },

    /// Failed; visible until retried
    Error {
        kind: StageErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl StageResult {
    pub fn loading() -> Self {
        Self::Loading {
            started_at: Utc::now(),
        }
    }

    pub fn success(payload: StagePayload) -> Self {
        Self::Success {
            payload,
            produced_at: Utc::now(),
        }
    }

    pub fn error(error: StageError) -> Self {
        Self::Error {
            kind: error.kind,
            message: error.message,
            hint: error.hint,
        }
    }

    pub fn status(&self) -> StageStatus {
        match self {
            StageResult::Idle => StageStatus::Idle,
            StageResult::Loading { .. } => StageStatus::Loading,
            StageResult::Success { .. } => StageStatus::Success,
            StageResult::Error { .. } => StageStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&StagePayload> {
        match self {
            StageResult::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<StageErrorKind> {
        match self {
            StageResult::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            StageResult::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Status tag of a `StageResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Why a stage ended in `error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Inputs from an upstream stage are present but unusable
    UpstreamUnmet,

    /// The collaborator call failed
    CollaboratorFailure,

    /// The collaborator call exceeded its time bound
    CollaboratorTimeout,

    /// The collaborator answered with data that could not be normalized
    MalformedResponse,
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageErrorKind::UpstreamUnmet => "upstream dependency unmet",
            StageErrorKind::CollaboratorFailure => "collaborator call failed",
            StageErrorKind::CollaboratorTimeout => "timed out",
            StageErrorKind::MalformedResponse => "collaborator returned unusable data",
        };
        f.write_str(s)
    }
}

/// A stage failure as produced by an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: StageErrorKind,
    pub message: String,
    pub hint: Option<String>,
}

impl StageError {
    pub fn new(kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn upstream_unmet(stage: Stage, detail: impl fmt::Display) -> Self {
        Self::new(
            StageErrorKind::UpstreamUnmet,
            format!("{} cannot run: {}", stage.label(), detail),
        )
    }

    /// Collaborator failure, keeping the collaborator's message verbatim
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::CollaboratorFailure, message)
    }

    pub fn timeout(stage: Stage, bound: Duration) -> Self {
        Self::new(
            StageErrorKind::CollaboratorTimeout,
            format!(
                "{} timed out after {:?}. The service may be busy; retry this stage.",
                stage.label(),
                bound
            ),
        )
    }

    pub fn malformed(stage: Stage, detail: impl fmt::Display) -> Self {
        Self::new(
            StageErrorKind::MalformedResponse,
            format!("{} returned unusable data: {}", stage.label(), detail),
        )
    }

    /// Attach a remediation hint (only surfaced for extraction)
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for StageError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::ExtractionPayload;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(StageResult::default().status(), StageStatus::Idle);
    }

    #[test]
    fn test_success_exposes_payload() {
        let result = StageResult::success(StagePayload::Extraction(ExtractionPayload {
            text: "x".to_string(),
            pages: 1,
        }));

        assert!(result.is_success());
        assert_eq!(result.payload().unwrap().stage(), Stage::Extraction);
        assert!(result.error_kind().is_none());
    }

    #[test]
    fn test_timeout_message_is_distinct() {
        let err = StageError::timeout(Stage::SimilarPapers, Duration::from_secs(300));
        assert_eq!(err.kind, StageErrorKind::CollaboratorTimeout);
        assert!(err.message.contains("timed out after 300s"));
        assert!(err.message.contains("retry"));
    }

    #[test]
    fn test_error_result_serialization() {
        let result = StageResult::error(
            StageError::malformed(Stage::Extraction, "no text").with_hint("Upload a text PDF"),
        );

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "malformed_response");
        assert_eq!(value["hint"], "Upload a text PDF");

        let parsed: StageResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, result);
    }
}
