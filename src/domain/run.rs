//! Run outcomes and pipeline snapshots.
//!
//! A run is one orchestration pass over a document's stages. Its record is
//! ephemeral; what survives is the outcome and the per-stage results.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::document::DocumentId;
use super::result::{StageErrorKind, StageResult, StageStatus};
use super::stage::Stage;

/// Terminal outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    /// Every stage holds a success
    Completed,

    /// A stage executor failed; its error result stays visible
    Failed {
        stage: Stage,
        kind: StageErrorKind,
        message: String,
    },

    /// A stage's prerequisites were not all successful; the run stopped
    /// without marking anything as failed
    Halted { stage: Stage, waiting_on: Vec<Stage> },

    /// The run was cancelled before it finished
    Cancelled,

    /// A sample document was seeded from its bundle
    Seeded,
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed | RunOutcome::Seeded => RunState::Completed,
            RunOutcome::Failed { stage, .. } => RunState::Failed { stage: *stage },
            RunOutcome::Halted { .. } => RunState::NotStarted,
            RunOutcome::Cancelled => RunState::Superseded,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed | RunOutcome::Seeded)
    }
}

/// Orchestrator state for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunState {
    NotStarted,
    Running { stage: Stage },
    Completed,
    Failed { stage: Stage },
    Superseded,
}

/// Read-only view of all stage results for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub document_id: DocumentId,

    /// One entry per stage, idle when nothing is recorded
    pub results: BTreeMap<Stage, StageResult>,

    /// Whether a run is currently registered for the document
    pub running: bool,

    /// Time bound of each stage, used for the remaining-time hint
    #[serde(skip)]
    pub timeouts: BTreeMap<Stage, Duration>,
}

impl PipelineSnapshot {
    pub fn result(&self, stage: Stage) -> &StageResult {
        static IDLE: StageResult = StageResult::Idle;
        self.results.get(&stage).unwrap_or(&IDLE)
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.result(stage).status()
    }

    /// First stage (in pipeline order) with the given status
    pub fn first_stage_with_status(&self, status: StageStatus) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.status(*stage) == status)
    }

    pub fn loading_stage(&self) -> Option<Stage> {
        self.first_stage_with_status(StageStatus::Loading)
    }

    /// The stage a presentation layer should focus: the loading one, else
    /// the first failed one
    pub fn current_stage(&self) -> Option<Stage> {
        self.loading_stage()
            .or_else(|| self.first_stage_with_status(StageStatus::Error))
    }

    /// Best-effort time left before the loading stage hits its bound
    pub fn time_remaining(&self) -> Option<Duration> {
        let stage = self.loading_stage()?;
        let bound = *self.timeouts.get(&stage)?;

        match self.result(stage) {
            StageResult::Loading { started_at } => {
                let elapsed = (Utc::now() - *started_at).to_std().unwrap_or_default();
                Some(bound.saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        Stage::ALL.iter().all(|stage| self.result(*stage).is_success())
    }

    pub fn state(&self) -> RunState {
        if let Some(stage) = self.loading_stage() {
            return RunState::Running { stage };
        }
        if self.is_complete() {
            return RunState::Completed;
        }
        if let Some(stage) = self.first_stage_with_status(StageStatus::Error) {
            return RunState::Failed { stage };
        }
        RunState::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::StageError;

    fn snapshot(results: Vec<(Stage, StageResult)>) -> PipelineSnapshot {
        PipelineSnapshot {
            document_id: DocumentId::new("d1"),
            results: results.into_iter().collect(),
            running: false,
            timeouts: Stage::ALL
                .into_iter()
                .map(|s| (s, Duration::from_secs(300)))
                .collect(),
        }
    }

    #[test]
    fn test_current_stage_prefers_loading() {
        let snap = snapshot(vec![
            (
                Stage::Claims,
                StageResult::error(StageError::collaborator("boom")),
            ),
            (Stage::Patents, StageResult::loading()),
        ]);

        assert_eq!(snap.current_stage(), Some(Stage::Patents));
        assert_eq!(snap.state(), RunState::Running { stage: Stage::Patents });
    }

    #[test]
    fn test_current_stage_falls_back_to_error() {
        let snap = snapshot(vec![(
            Stage::SimilarPapers,
            StageResult::error(StageError::timeout(Stage::SimilarPapers, Duration::from_secs(1))),
        )]);

        assert_eq!(snap.current_stage(), Some(Stage::SimilarPapers));
        assert_eq!(snap.state(), RunState::Failed { stage: Stage::SimilarPapers });
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = snapshot(vec![]);
        assert_eq!(snap.current_stage(), None);
        assert_eq!(snap.status(Stage::Extraction), StageStatus::Idle);
        assert_eq!(snap.state(), RunState::NotStarted);
        assert!(snap.time_remaining().is_none());
    }

    #[test]
    fn test_time_remaining_is_bounded() {
        let snap = snapshot(vec![(Stage::Extraction, StageResult::loading())]);
        let remaining = snap.time_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(300));
        assert!(remaining > Duration::from_secs(290));
    }

    #[test]
    fn test_outcome_states() {
        assert_eq!(RunOutcome::Completed.state(), RunState::Completed);
        assert_eq!(RunOutcome::Cancelled.state(), RunState::Superseded);
        assert!(RunOutcome::Seeded.is_completed());
    }
}
