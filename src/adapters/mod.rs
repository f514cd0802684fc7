//! Adapter interfaces for external collaborators.
//!
//! Stage executors never talk to a service directly: each stage goes
//! through a `Collaborator`, and raw document bytes come from a
//! `DocumentSource`. Concrete transports live in submodules.

pub mod http;
pub mod source;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ContentHandle, DocumentId, Stage, StagePayload};

pub use http::HttpCollaborator;
pub use source::FileDocumentSource;

/// Request handed to a collaborator for one stage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    /// Stage being executed
    pub stage: Stage,

    /// Document being analyzed
    pub document_id: DocumentId,

    /// Display name of the document
    pub document_name: String,

    /// Success payloads of the stage's prerequisites
    pub inputs: BTreeMap<Stage, StagePayload>,

    /// Raw document bytes (extraction only)
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

impl StageRequest {
    pub fn input(&self, stage: Stage) -> Option<&StagePayload> {
        self.inputs.get(&stage)
    }
}

/// Errors returned by collaborators and document sources
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The service could not be reached
    #[error("Request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The service refused the request
    #[error("{0}")]
    Rejected(String),

    /// The response body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl CollaboratorError {
    /// Whether the service was reachable but returned unusable data
    pub fn is_malformed(&self) -> bool {
        matches!(self, CollaboratorError::Decode(_))
    }
}

/// An external service performing one or more stages
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Human-readable collaborator name
    fn name(&self) -> &str;

    /// Execute a stage and return the raw response.
    ///
    /// Callers cancel an in-flight call by dropping the returned future.
    async fn invoke(&self, request: StageRequest) -> Result<Value, CollaboratorError>;
}

/// Resolves content handles into raw document bytes
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load(&self, handle: &ContentHandle) -> Result<Vec<u8>, CollaboratorError>;
}

/// Collaborator per stage plus the document source
#[derive(Clone)]
pub struct Collaborators {
    stages: HashMap<Stage, Arc<dyn Collaborator>>,
    source: Arc<dyn DocumentSource>,
}

impl Collaborators {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            stages: HashMap::new(),
            source,
        }
    }

    /// Use `collaborator` for `stage`
    pub fn with(mut self, stage: Stage, collaborator: Arc<dyn Collaborator>) -> Self {
        self.stages.insert(stage, collaborator);
        self
    }

    /// Use one collaborator for every stage
    pub fn with_all(mut self, collaborator: Arc<dyn Collaborator>) -> Self {
        for stage in Stage::ALL {
            self.stages.insert(stage, collaborator.clone());
        }
        self
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn Collaborator>> {
        self.stages.get(&stage).cloned()
    }

    pub fn source(&self) -> Arc<dyn DocumentSource> {
        self.source.clone()
    }
}
