//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use paperflow::adapters::{Collaborator, CollaboratorError, Collaborators, DocumentSource, StageRequest};
use paperflow::core::{DurableCache, MemoryCache, Orchestrator, StageCache, StageTimeouts};
use paperflow::domain::{ContentHandle, Document, DocumentId, Stage};

/// What a scripted collaborator does on one call
pub enum Behavior {
    Respond(Value),
    Fail(CollaboratorError),
    /// Never resolves; only a timeout or cancellation ends the call
    Hang,
    /// Wait for the gate, then return the default response
    WaitFor(Arc<Notify>),
}

/// Collaborator answering every stage from per-stage scripts.
///
/// Each call pops the next scripted behavior for its stage; with an empty
/// script it returns `default_response(stage)`.
#[derive(Default)]
pub struct ScriptedCollaborator {
    scripts: Mutex<HashMap<Stage, VecDeque<Behavior>>>,
    calls: Mutex<HashMap<Stage, usize>>,
}

impl ScriptedCollaborator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a behavior for the next call of `stage`
    pub fn script(&self, stage: Stage, behavior: Behavior) {
        self.scripts
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(behavior);
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.calls.lock().unwrap().get(&stage).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Collaborator for ScriptedCollaborator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: StageRequest) -> Result<Value, CollaboratorError> {
        let stage = request.stage;
        *self.calls.lock().unwrap().entry(stage).or_insert(0) += 1;

        if stage == Stage::Extraction {
            assert!(request.content.is_some(), "extraction without content");
        }

        let behavior = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);

        match behavior {
            None => Ok(default_response(stage)),
            Some(Behavior::Respond(value)) => Ok(value),
            Some(Behavior::Fail(error)) => Err(error),
            Some(Behavior::Hang) => std::future::pending().await,
            Some(Behavior::WaitFor(gate)) => {
                gate.notified().await;
                Ok(default_response(stage))
            }
        }
    }
}

/// Valid response JSON for each stage
pub fn default_response(stage: Stage) -> Value {
    match stage {
        Stage::Extraction => json!({
            "text": "Graphene oxide membranes reject 97% of dissolved salts.",
            "pages": 12
        }),
        Stage::Claims => json!({
            "summary": "Membrane desalination",
            "claims": [
                { "id": "c1", "text": "Graphene oxide membranes reject 97% of salts" },
                { "id": "c2", "text": "Flux is stable over 100 hours", "category": "durability" }
            ]
        }),
        Stage::SimilarPapers => json!({
            "papers": [ { "title": "Selective ion sieving through graphene", "year": 2017 } ]
        }),
        Stage::ResearchGroups => json!({
            "text": "One group found",
            "groups": [ { "name": "Nanofluidics Lab", "institution": "Manchester" } ]
        }),
        Stage::Contacts => json!({
            "contacts": [ { "name": "R. Nair", "group": "Nanofluidics Lab" } ]
        }),
        Stage::Theses => json!({
            "theses": [ { "title": "Water transport in 2D capillaries" } ]
        }),
        Stage::Patents => json!({
            "patents": [ { "title": "Graphene-based filtration membrane", "number": "US1234567" } ]
        }),
        Stage::VerifiedClaims => json!({
            "verifications": [
                { "claimId": "c1", "verdict": "supported", "sources": ["doi:10.1038/nnano.2017.21"] },
                { "claimId": "c2", "verdict": "inconclusive" }
            ]
        }),
    }
}

/// Source returning fixed bytes for any handle
pub struct MemorySource;

#[async_trait]
impl DocumentSource for MemorySource {
    async fn load(&self, _handle: &ContentHandle) -> Result<Vec<u8>, CollaboratorError> {
        Ok(b"%PDF-1.7 test document".to_vec())
    }
}

pub fn live_document(id: &str) -> Document {
    Document::with_id(DocumentId::new(id), format!("{}.pdf", id), format!("{}.pdf", id))
}

pub fn orchestrator_with(
    collaborator: Arc<ScriptedCollaborator>,
    cache: Arc<dyn DurableCache>,
    timeouts: StageTimeouts,
) -> Orchestrator {
    let collaborators = Collaborators::new(Arc::new(MemorySource)).with_all(collaborator);
    Orchestrator::new(collaborators, StageCache::new(cache), timeouts)
}

/// Orchestrator over a fresh memory cache with a 5 s bound per call
pub fn orchestrator(collaborator: Arc<ScriptedCollaborator>) -> Orchestrator {
    orchestrator_with(
        collaborator,
        Arc::new(MemoryCache::new()),
        StageTimeouts::uniform(Duration::from_secs(5)),
    )
}

/// Poll until `stage` is loading for the document
pub async fn wait_for_loading(orchestrator: &Orchestrator, document_id: &DocumentId, stage: Stage) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while orchestrator.snapshot(document_id).loading_stage() != Some(stage) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} never started loading",
            stage
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
