//! In-memory stage result store.
//!
//! Holds the latest `StageResult` per document and stage. Every operation
//! is a short synchronous map mutation; durable caching is handled
//! separately by `core::cache`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{DocumentId, Stage, StagePayload, StageResult};

type DocumentResults = BTreeMap<Stage, StageResult>;

/// Latest result per (document, stage)
#[derive(Debug, Default)]
pub struct ResultStore {
    results: RwLock<HashMap<DocumentId, DocumentResults>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DocumentId, DocumentResults>> {
        self.results.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DocumentId, DocumentResults>> {
        self.results.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Latest result for a stage, if any was recorded
    pub fn get(&self, document_id: &DocumentId, stage: Stage) -> Option<StageResult> {
        self.read()
            .get(document_id)
            .and_then(|results| results.get(&stage))
            .cloned()
    }

    /// Record a result (last write wins)
    pub fn set(&self, document_id: &DocumentId, stage: Stage, result: StageResult) {
        self.write()
            .entry(document_id.clone())
            .or_default()
            .insert(stage, result);
    }

    /// Forget the result for one stage
    pub fn clear(&self, document_id: &DocumentId, stage: Stage) {
        if let Some(results) = self.write().get_mut(document_id) {
            results.remove(&stage);
        }
    }

    /// Forget everything recorded for a document
    pub fn remove_document(&self, document_id: &DocumentId) {
        self.write().remove(document_id);
    }

    /// Payload of a stage that currently holds a success
    pub fn success_payload(&self, document_id: &DocumentId, stage: Stage) -> Option<StagePayload> {
        self.read()
            .get(document_id)
            .and_then(|results| results.get(&stage))
            .and_then(|result| result.payload())
            .cloned()
    }

    pub fn is_success(&self, document_id: &DocumentId, stage: Stage) -> bool {
        self.read()
            .get(document_id)
            .and_then(|results| results.get(&stage))
            .map(StageResult::is_success)
            .unwrap_or(false)
    }

    /// Copy of all results recorded for a document
    pub fn results(&self, document_id: &DocumentId) -> BTreeMap<Stage, StageResult> {
        self.read().get(document_id).cloned().unwrap_or_default()
    }

    /// Documents with at least one recorded result
    pub fn documents(&self) -> Vec<DocumentId> {
        self.read().keys().cloned().collect()
    }
}
