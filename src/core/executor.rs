//! Stage executors.
//!
//! One executor call runs one stage for one document: it moves the stage
//! to `loading`, makes exactly one time-bounded collaborator call,
//! normalizes the response, caches it and records the terminal result.
//! Failures become `error` results; nothing partial is ever stored as a
//! success.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{Collaborators, CollaboratorError, StageRequest};
use crate::domain::{
    Document, DocumentId, ExtractionPayload, Stage, StageError, StageErrorKind, StagePayload,
    StageResult,
};

use super::cache::StageCache;
use super::graph::prerequisites_of;
use super::store::ResultStore;
use super::timeouts::StageTimeouts;

const EXTRACTION_EMPTY_HINT: &str =
    "The document may be a scanned image. Upload a PDF with selectable text.";
const EXTRACTION_FAILED_HINT: &str = "Check that the file is a readable PDF and retry extraction.";

/// Success payloads of a stage's prerequisites
pub type StageInputs = BTreeMap<Stage, StagePayload>;

/// Collect the prerequisite payloads of `stage`.
///
/// Returns the prerequisites that do not hold a success when any are
/// missing; partial availability is "not ready", never an error.
pub fn gather_inputs(
    store: &ResultStore,
    document_id: &DocumentId,
    stage: Stage,
) -> Result<StageInputs, Vec<Stage>> {
    let mut inputs = StageInputs::new();
    let mut missing = Vec::new();

    for prereq in prerequisites_of(stage) {
        match store.success_payload(document_id, *prereq) {
            Some(payload) => {
                inputs.insert(*prereq, payload);
            }
            None => missing.push(*prereq),
        }
    }

    if missing.is_empty() {
        Ok(inputs)
    } else {
        Err(missing)
    }
}

/// Resets a stage left in `loading` when its executor is dropped mid-call
struct LoadingGuard<'a> {
    store: &'a ResultStore,
    document_id: &'a DocumentId,
    stage: Stage,
    armed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(store: &'a ResultStore, document_id: &'a DocumentId, stage: Stage) -> Self {
        store.set(document_id, stage, StageResult::loading());
        Self {
            store,
            document_id,
            stage,
            armed: true,
        }
    }

    /// Record the terminal result and stand down
    fn finish(mut self, result: StageResult) -> StageResult {
        self.store.set(self.document_id, self.stage, result.clone());
        self.armed = false;
        result
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(
                document_id = %self.document_id,
                stage = %self.stage,
                "Stage cancelled mid-call, resetting to idle"
            );
            self.store.clear(self.document_id, self.stage);
        }
    }
}

/// Runs individual stages against their collaborators
pub struct StageExecutor {
    collaborators: Collaborators,
    timeouts: StageTimeouts,
    store: Arc<ResultStore>,
    cache: StageCache,
}

impl StageExecutor {
    pub fn new(
        collaborators: Collaborators,
        timeouts: StageTimeouts,
        store: Arc<ResultStore>,
        cache: StageCache,
    ) -> Self {
        Self {
            collaborators,
            timeouts,
            store,
            cache,
        }
    }

    pub fn timeouts(&self) -> &StageTimeouts {
        &self.timeouts
    }

    /// Execute `stage` for `document` with already-gathered inputs and
    /// return the terminal result recorded in the store.
    #[instrument(skip_all, fields(document_id = %document.id, stage = %stage))]
    pub async fn execute(&self, document: &Document, stage: Stage, inputs: StageInputs) -> StageResult {
        if stage == Stage::Extraction && document.is_sample() {
            debug!("Sample document, using placeholder extraction");
            let result = StageResult::success(StagePayload::Extraction(ExtractionPayload::placeholder()));
            self.store.set(&document.id, stage, result.clone());
            return result;
        }

        if let Err(error) = check_inputs(stage, &inputs) {
            warn!(error = %error, "Stage inputs unusable");
            let result = StageResult::error(error);
            self.store.set(&document.id, stage, result.clone());
            return result;
        }

        let Some(collaborator) = self.collaborators.get(stage) else {
            let error = StageError::collaborator(format!(
                "No collaborator configured for {}",
                stage
            ));
            let result = StageResult::error(with_extraction_hint(stage, error));
            self.store.set(&document.id, stage, result.clone());
            return result;
        };

        let bound = self.timeouts.for_stage(stage);
        let guard = LoadingGuard::enter(&self.store, &document.id, stage);
        let started = Instant::now();

        let source = self.collaborators.source();
        let call = async {
            let content = if stage == Stage::Extraction {
                match source.load(&document.content).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => return Err(e),
                }
            } else {
                None
            };

            let request = StageRequest {
                stage,
                document_id: document.id.clone(),
                document_name: document.name.clone(),
                inputs,
                content,
            };
            collaborator.invoke(request).await
        };

        let outcome = timeout(bound, call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let normalized = match outcome {
            Err(_) => Err(StageError::timeout(stage, bound)),
            Ok(Err(e)) => Err(collaborator_error(stage, e)),
            Ok(Ok(raw)) => {
                StagePayload::from_response(stage, raw).map_err(|detail| StageError::malformed(stage, detail))
            }
        };

        match normalized {
            Ok(payload) => {
                self.cache.write(&document.id, stage, &payload).await;
                info!(duration_ms, summary = %payload.summary(), "Stage completed");
                guard.finish(StageResult::success(payload))
            }
            Err(error) => {
                warn!(duration_ms, kind = ?error.kind, error = %error.message, "Stage failed");
                guard.finish(StageResult::error(with_extraction_hint(stage, error)))
            }
        }
    }
}

/// Stage-specific input rules beyond "prerequisite holds a success"
fn check_inputs(stage: Stage, inputs: &StageInputs) -> Result<(), StageError> {
    if stage == Stage::Theses {
        let has_groups = inputs
            .get(&Stage::ResearchGroups)
            .and_then(StagePayload::as_research_groups)
            .map(|groups| groups.has_groups())
            .unwrap_or(false);

        if !has_groups {
            return Err(StageError::upstream_unmet(
                stage,
                "research group discovery found no structured groups to search theses for",
            ));
        }
    }

    Ok(())
}

fn collaborator_error(stage: Stage, error: CollaboratorError) -> StageError {
    if error.is_malformed() {
        StageError::malformed(stage, error)
    } else {
        StageError::collaborator(error.to_string())
    }
}

/// Remediation hints are only offered for extraction
fn with_extraction_hint(stage: Stage, error: StageError) -> StageError {
    if stage != Stage::Extraction {
        return error;
    }

    let hint = match error.kind {
        StageErrorKind::MalformedResponse => EXTRACTION_EMPTY_HINT,
        _ => EXTRACTION_FAILED_HINT,
    };
    error.with_hint(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResearchGroup, ResearchGroupsPayload};

    fn groups(groups: Vec<ResearchGroup>) -> StagePayload {
        StagePayload::ResearchGroups(ResearchGroupsPayload {
            text: String::new(),
            groups,
        })
    }

    #[test]
    fn test_gather_inputs_reports_missing() {
        let store = ResultStore::new();
        let doc = DocumentId::new("d1");

        let missing = gather_inputs(&store, &doc, Stage::VerifiedClaims).unwrap_err();
        assert_eq!(missing.len(), 4);

        let inputs = gather_inputs(&store, &doc, Stage::Extraction).unwrap();
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_loading_prerequisite_is_not_ready() {
        let store = ResultStore::new();
        let doc = DocumentId::new("d1");
        store.set(&doc, Stage::Extraction, StageResult::loading());

        assert_eq!(
            gather_inputs(&store, &doc, Stage::Claims).unwrap_err(),
            vec![Stage::Extraction]
        );
    }

    #[test]
    fn test_theses_requires_groups() {
        let mut inputs = StageInputs::new();
        inputs.insert(Stage::ResearchGroups, groups(vec![]));

        let err = check_inputs(Stage::Theses, &inputs).unwrap_err();
        assert_eq!(err.kind, StageErrorKind::UpstreamUnmet);

        inputs.insert(
            Stage::ResearchGroups,
            groups(vec![ResearchGroup {
                name: "Vision Lab".to_string(),
                institution: None,
                lead: None,
                topics: vec![],
            }]),
        );
        assert!(check_inputs(Stage::Theses, &inputs).is_ok());
    }

    #[test]
    fn test_hints_only_for_extraction() {
        let err = with_extraction_hint(Stage::Extraction, StageError::malformed(Stage::Extraction, "empty"));
        assert_eq!(err.hint.as_deref(), Some(EXTRACTION_EMPTY_HINT));

        let err = with_extraction_hint(Stage::Claims, StageError::collaborator("down"));
        assert!(err.hint.is_none());
    }

    #[test]
    fn test_decode_errors_are_malformed() {
        let err = collaborator_error(Stage::Claims, CollaboratorError::Decode("eof".into()));
        assert_eq!(err.kind, StageErrorKind::MalformedResponse);

        let err = collaborator_error(
            Stage::Claims,
            CollaboratorError::Status {
                status: 502,
                body: "bad gateway".into(),
            },
        );
        assert_eq!(err.kind, StageErrorKind::CollaboratorFailure);
        assert!(err.message.contains("502"));
    }
}
