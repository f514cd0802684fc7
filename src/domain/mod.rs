//! Domain types for the paperflow orchestrator.
//!
//! This module contains the core data structures:
//! - Stage: the fixed set of analysis stages
//! - Document: what gets processed
//! - Payload / Result: what each stage produces
//! - Events: notifications for observers
//! - Run: run outcomes and snapshots

pub mod document;
pub mod events;
pub mod payload;
pub mod result;
pub mod run;
pub mod stage;

// Re-export commonly used types
pub use document::{ContentHandle, Document, DocumentId, DocumentKind, SampleBundle};
pub use events::{StageEvent, StageEventKind};
pub use payload::{
    Claim, ClaimVerification, ClaimsPayload, Contact, ContactsPayload, ExtractionPayload, Paper,
    Patent, PatentsPayload, ResearchGroup, ResearchGroupsPayload, SimilarPapersPayload,
    StagePayload, ThesesPayload, Thesis, Verdict, VerifiedClaimsPayload,
};
pub use result::{StageError, StageErrorKind, StageResult, StageStatus};
pub use run::{PipelineSnapshot, RunOutcome, RunState};
pub use stage::{Freshness, Stage, UnknownStage};
