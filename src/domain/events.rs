//! Events emitted while documents move through the pipeline.
//!
//! Events are broadcast to observers (a UI, a log shipper, the CLI). They
//! are purely informational: the orchestrator never waits for them to be
//! read and never derives state from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::DocumentId;
use super::stage::Stage;

/// A single pipeline event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred
    pub timestamp: DateTime<Utc>,

    /// The document this event belongs to
    pub document_id: DocumentId,

    /// The run that produced it (none for seeding)
    pub run_id: Option<Uuid>,

    /// Stage concerned (if applicable)
    pub stage: Option<Stage>,

    /// Type of event
    pub kind: StageEventKind,

    /// Human-readable summary
    pub summary: String,

    /// Time taken in milliseconds (for finished stages)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl StageEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        document_id: DocumentId,
        run_id: Option<Uuid>,
        stage: Option<Stage>,
        kind: StageEventKind,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            document_id,
            run_id,
            stage,
            kind,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEventKind {
    /// A run was registered for a document
    RunStarted,

    /// Every stage reached success
    RunCompleted,

    /// A stage failed and the run stopped there
    RunFailed,

    /// A prerequisite was not ready; the run stopped quietly
    RunHalted,

    /// The run was cancelled
    RunCancelled,

    /// A stage executor began its collaborator call
    StageStarted,

    /// A stage executor finished successfully
    StageCompleted,

    /// A stage executor failed
    StageFailed,

    /// A stage was hydrated from the durable cache
    StageHydrated,

    /// A stage already held a success and was skipped
    StageSkipped,

    /// A sample document was seeded from its bundle
    DocumentSeeded,
}
