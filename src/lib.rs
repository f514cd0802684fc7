//! paperflow - Staged document analysis pipeline
//!
//! Turns an uploaded research document into eight analysis results
//! (extraction, claims, similar papers, research groups, contacts, theses,
//! patents, verified claims), each produced by an external collaborator
//! and gated on the success of its prerequisites.
//!
//! # Architecture
//!
//! - Stages run in a fixed dependency order; a stage runs only once every
//!   prerequisite holds a success
//! - At most one run per document is in flight; concurrent callers join it
//! - Successful payloads are written to a versioned durable cache and
//!   hydrated on later runs instead of being recomputed
//! - A failed run is resumed from the failed stage; nothing retries on its own
//!
//! # Modules
//!
//! - `adapters`: Collaborator and document source integrations (HTTP, filesystem)
//! - `core`: Orchestration logic (graph, store, cache, executor, registry)
//! - `domain`: Data structures (Stage, Document, StageResult, events)
//! - `library`: Document catalog and sample bundles
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Register a document
//! paperflow docs add paper.pdf
//!
//! # Run the pipeline
//! paperflow run <document-id>
//!
//! # Retry from a failed stage
//! paperflow run <document-id> --from similarPapers
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{Collaborator, CollaboratorError, Collaborators, DocumentSource};
pub use core::{Orchestrator, RunHandle, StageCache, StageTimeouts};
pub use domain::{
    Document, DocumentId, PipelineSnapshot, RunOutcome, RunState, Stage, StageEvent,
    StagePayload, StageResult,
};
pub use library::DocumentCatalog;
