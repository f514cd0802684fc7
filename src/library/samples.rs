//! Sample documents with bundled results.
//!
//! A sample file is JSON of the form
//!
//! ```json
//! {
//!   "id": "sample-graphene",
//!   "name": "Graphene membranes (sample)",
//!   "payloads": [
//!     { "stage": "claims", "data": { "claims": [ ... ] } },
//!     ...
//!   ]
//! }
//! ```
//!
//! Every payload is checked against its own invariants. Stages without a
//! payload are seeded as errors when the document is started.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{Document, DocumentId, SampleBundle, StagePayload};

#[derive(Debug, Deserialize)]
struct SampleFile {
    id: Option<String>,
    name: String,
    payloads: Vec<StagePayload>,
}

/// Parse a sample document from JSON
pub fn parse_sample(content: &str) -> Result<Document> {
    let file: SampleFile = serde_json::from_str(content).context("Failed to parse sample JSON")?;

    let mut seen = HashSet::new();
    let mut bundle = SampleBundle::new();
    for payload in file.payloads {
        let stage = payload.stage();
        if !seen.insert(stage) {
            bail!("Sample bundles {} more than once", stage);
        }
        if let Err(reason) = payload.validate() {
            bail!("Sample payload for {} is invalid: {}", stage, reason);
        }
        bundle = bundle.with(payload);
    }

    let missing = bundle.missing_stages();
    if !missing.is_empty() {
        warn!(sample = %file.name, ?missing, "Sample bundle is incomplete");
    }

    let id = file
        .id
        .map(DocumentId::from)
        .unwrap_or_else(DocumentId::generate);
    Ok(Document::sample(id, file.name, bundle))
}

/// Load a sample document from a JSON file
pub async fn load_sample(path: &Path) -> Result<Document> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read sample: {}", path.display()))?;

    parse_sample(&content).with_context(|| format!("Invalid sample: {}", path.display()))
}
