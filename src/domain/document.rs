//! Documents processed by the pipeline.
//!
//! A document is immutable once created. Live documents are analyzed by
//! the stage executors; sample documents ship with a bundled dataset and
//! are never re-processed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::StagePayload;
use super::stage::Stage;

/// Unique document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque content location, resolved by a `DocumentSource`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHandle(pub String);

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document flowing through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,

    /// Display name (usually the uploaded file name)
    pub name: String,

    /// Where the raw content lives
    pub content: ContentHandle,

    /// Live or bundled sample
    #[serde(default)]
    pub kind: DocumentKind,

    /// When the document was created
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a live document with a generated id
    pub fn live(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(DocumentId::generate(), name, content)
    }

    /// Create a live document with a known id
    pub fn with_id(id: DocumentId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: ContentHandle(content.into()),
            kind: DocumentKind::Live,
            created_at: Utc::now(),
        }
    }

    /// Create a sample document carrying its bundled results
    pub fn sample(id: DocumentId, name: impl Into<String>, bundle: SampleBundle) -> Self {
        Self {
            id,
            name: name.into(),
            content: ContentHandle(String::new()),
            kind: DocumentKind::Sample { bundle },
            created_at: Utc::now(),
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self.kind, DocumentKind::Sample { .. })
    }

    pub fn sample_bundle(&self) -> Option<&SampleBundle> {
        match &self.kind {
            DocumentKind::Sample { bundle } => Some(bundle),
            DocumentKind::Live => None,
        }
    }
}

/// Whether a document is analyzed or seeded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DocumentKind {
    /// Uploaded document, analyzed stage by stage
    #[default]
    Live,

    /// Reference sample with precomputed results
    Sample { bundle: SampleBundle },
}

/// Precomputed results shipped with a sample document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleBundle {
    /// One payload per stage
    pub payloads: BTreeMap<Stage, StagePayload>,
}

impl SampleBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, payload: StagePayload) -> Self {
        self.payloads.insert(payload.stage(), payload);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<&StagePayload> {
        self.payloads.get(&stage)
    }

    /// Stages with no bundled payload
    pub fn missing_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| !self.payloads.contains_key(stage))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::ExtractionPayload;

    #[test]
    fn test_live_document() {
        let doc = Document::live("paper.pdf", "/tmp/paper.pdf");
        assert!(!doc.is_sample());
        assert!(doc.sample_bundle().is_none());
        assert_eq!(doc.content.0, "/tmp/paper.pdf");
    }

    #[test]
    fn test_sample_bundle_missing_stages() {
        let bundle = SampleBundle::new().with(StagePayload::Extraction(ExtractionPayload {
            text: "Abstract".to_string(),
            pages: 1,
        }));

        let missing = bundle.missing_stages();
        assert_eq!(missing.len(), 7);
        assert!(!missing.contains(&Stage::Extraction));
    }

    #[test]
    fn test_document_serialization() {
        let doc = Document::with_id(DocumentId::new("d1"), "paper.pdf", "uploads/d1.pdf");
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: Document = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, DocumentId::new("d1"));
        assert!(!parsed.is_sample());
    }
}
