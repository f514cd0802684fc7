//! Core orchestration logic.
//!
//! This module contains:
//! - Graph: stage prerequisites and ordering
//! - Store: in-memory stage results
//! - Cache: durable, versioned stage payloads
//! - Executor: one time-bounded collaborator call per stage
//! - Registry: single-flight runs per document
//! - Orchestrator: main execution engine

pub mod cache;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod timeouts;

// Re-export commonly used types
pub use cache::{
    decode_entry, encode_entry, hash_document_id, CacheEnvelope, CacheError, CacheKey,
    DurableCache, FileCache, MemoryCache, StageCache, SCHEMA_VERSION,
};
pub use executor::{gather_inputs, StageExecutor, StageInputs};
pub use graph::{dependents_of, next_stage, prerequisites_of, stages_from, STAGE_ORDER};
pub use orchestrator::Orchestrator;
pub use registry::{Registration, RunHandle, RunLease, RunRegistry};
pub use store::ResultStore;
pub use timeouts::{StageTimeouts, TimeoutSettings, DEFAULT_STAGE_TIMEOUT_SECONDS};
