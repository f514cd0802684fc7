//! Pipeline orchestrator.
//!
//! Walks a document's stages in dependency-graph order. For each stage it
//! reuses an in-memory success, then a cached one, and only then invokes
//! the stage executor. One run per document is in flight at a time;
//! concurrent callers join it. A run stops at the first stage whose
//! prerequisites are not ready or whose executor fails.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::Collaborators;
use crate::domain::{
    Document, DocumentId, ExtractionPayload, Freshness, PipelineSnapshot, RunOutcome,
    SampleBundle, Stage, StageError, StageEvent, StageEventKind, StagePayload, StageResult,
};

use super::cache::{CacheEnvelope, StageCache};
use super::executor::{gather_inputs, StageExecutor};
use super::graph::{stages_from, STAGE_ORDER};
use super::registry::{Registration, RunHandle, RunLease, RunRegistry};
use super::store::ResultStore;
use super::timeouts::StageTimeouts;

/// Capacity of the event channel; slow subscribers lose the oldest events
const EVENT_CAPACITY: usize = 256;

/// Main pipeline orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ResultStore>,
    registry: Arc<RunRegistry>,
    cache: StageCache,
    executor: StageExecutor,
    events: broadcast::Sender<StageEvent>,
}

impl Orchestrator {
    /// Create an orchestrator with its own result store and run registry
    pub fn new(collaborators: Collaborators, cache: StageCache, timeouts: StageTimeouts) -> Self {
        let store = Arc::new(ResultStore::new());
        let executor = StageExecutor::new(collaborators, timeouts, store.clone(), cache.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                store,
                registry: RunRegistry::new(),
                cache,
                executor,
                events,
            }),
        }
    }

    /// Run the pipeline for a document and wait for the outcome.
    ///
    /// With `resume_from`, that stage and every later one are re-executed
    /// regardless of earlier results.
    pub async fn start(&self, document: &Document, resume_from: Option<Stage>) -> RunOutcome {
        self.start_run(document, resume_from).wait().await
    }

    /// Start (or join) the pipeline run for a document without waiting.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub fn start_run(&self, document: &Document, resume_from: Option<Stage>) -> RunHandle {
        if let Some(existing) = self.inner.registry.acquire(&document.id) {
            self.note_join(&existing, resume_from);
            return existing;
        }

        if let Some(bundle) = document.sample_bundle() {
            let outcome = self.inner.seed(&document.id, bundle);
            return RunHandle::finished(document.id.clone(), outcome);
        }

        match self.inner.registry.register(&document.id, resume_from) {
            Registration::Joined(existing) => {
                self.note_join(&existing, resume_from);
                existing
            }
            Registration::Started { handle, lease } => {
                let inner = Arc::clone(&self.inner);
                let document = document.clone();
                tokio::spawn(async move {
                    inner.drive(document, resume_from, lease).await;
                });
                handle
            }
        }
    }

    fn note_join(&self, existing: &RunHandle, resume_from: Option<Stage>) {
        if resume_from.is_some() && existing.resume_from != resume_from {
            debug!(
                run_id = %existing.run_id,
                requested = ?resume_from,
                "Joining in-flight run; resume directive ignored"
            );
        } else {
            debug!(run_id = %existing.run_id, "Joining in-flight run");
        }
    }

    /// Cancel the document's in-flight run; false when none is running
    pub fn cancel(&self, document_id: &DocumentId) -> bool {
        let cancelled = self.inner.registry.cancel(document_id);
        if cancelled {
            info!(%document_id, "Cancellation requested");
        }
        cancelled
    }

    pub fn is_running(&self, document_id: &DocumentId) -> bool {
        self.inner.registry.is_running(document_id)
    }

    /// Latest result of one stage
    pub fn result(&self, document_id: &DocumentId, stage: Stage) -> StageResult {
        self.inner.store.get(document_id, stage).unwrap_or_default()
    }

    /// Read-only view of every stage for presentation
    pub fn snapshot(&self, document_id: &DocumentId) -> PipelineSnapshot {
        let mut results = self.inner.store.results(document_id);
        for stage in STAGE_ORDER {
            results.entry(stage).or_default();
        }

        PipelineSnapshot {
            document_id: document_id.clone(),
            results,
            running: self.inner.registry.is_running(document_id),
            timeouts: self.inner.executor.timeouts().all(),
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.inner.events.subscribe()
    }

    /// Load cached results into the store without running anything.
    ///
    /// Returns the stages that were hydrated.
    pub async fn hydrate(&self, document_id: &DocumentId) -> Vec<Stage> {
        let mut hydrated = Vec::new();
        for stage in STAGE_ORDER {
            if self.inner.store.is_success(document_id, stage) {
                continue;
            }
            if let Some(envelope) = self.inner.cache.read(document_id, stage).await {
                if self.inner.hydrate_from(document_id, stage, envelope) {
                    hydrated.push(stage);
                }
            }
        }
        hydrated
    }

    /// Drop everything known about a document: cancel its run, clear its
    /// results and, with `purge_cache`, delete its durable entries.
    pub async fn forget(&self, document_id: &DocumentId, purge_cache: bool) {
        if let Some(handle) = self.inner.registry.acquire(document_id) {
            handle.cancel();
            handle.wait().await;
        }

        self.inner.store.remove_document(document_id);
        if purge_cache {
            self.inner.cache.invalidate(document_id, &STAGE_ORDER).await;
        }
        info!(%document_id, purge_cache, "Document forgotten");
    }
}

impl Inner {
    fn emit(&self, event: StageEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Drive one registered run to its outcome and release the lease
    async fn drive(&self, document: Document, resume_from: Option<Stage>, mut lease: RunLease) {
        let run_id = lease.run_id();
        info!(document_id = %document.id, %run_id, ?resume_from, "Starting pipeline run");
        self.emit(StageEvent::new(
            document.id.clone(),
            Some(run_id),
            None,
            StageEventKind::RunStarted,
            format!("Pipeline started for '{}'", document.name),
        ));

        let outcome = tokio::select! {
            outcome = self.walk(&document, resume_from, run_id) => outcome,
            _ = lease.cancelled() => {
                info!(document_id = %document.id, %run_id, "Run cancelled");
                self.emit(StageEvent::new(
                    document.id.clone(),
                    Some(run_id),
                    None,
                    StageEventKind::RunCancelled,
                    "Run cancelled",
                ));
                RunOutcome::Cancelled
            }
        };

        lease.complete(outcome);
    }

    /// Walk the stages in order for one run
    async fn walk(&self, document: &Document, resume_from: Option<Stage>, run_id: Uuid) -> RunOutcome {
        let document_id = &document.id;
        let mut stale: HashSet<Stage> = HashSet::new();

        if let Some(from) = resume_from {
            let forced = stages_from(from);
            for stage in forced {
                self.store.clear(document_id, *stage);
            }
            self.cache.invalidate(document_id, forced).await;
            stale.extend(forced.iter().copied());
            info!(%document_id, %from, "Resuming: cleared results from stage onwards");
        }

        for stage in STAGE_ORDER {
            if self.store.is_success(document_id, stage) {
                debug!(%document_id, %stage, "Stage already succeeded, skipping");
                self.emit(StageEvent::new(
                    document_id.clone(),
                    Some(run_id),
                    Some(stage),
                    StageEventKind::StageSkipped,
                    format!("{} already complete", stage.label()),
                ));
                continue;
            }

            if !stale.contains(&stage) {
                if let Some(envelope) = self.cache.read(document_id, stage).await {
                    if self.hydrate_from(document_id, stage, envelope) {
                        self.emit(StageEvent::new(
                            document_id.clone(),
                            Some(run_id),
                            Some(stage),
                            StageEventKind::StageHydrated,
                            format!("{} loaded from cache", stage.label()),
                        ));
                        continue;
                    }
                }
            }

            let inputs = match gather_inputs(&self.store, document_id, stage) {
                Ok(inputs) => inputs,
                Err(waiting_on) => {
                    info!(%document_id, %stage, ?waiting_on, "Prerequisites not ready, stopping run");
                    self.emit(StageEvent::new(
                        document_id.clone(),
                        Some(run_id),
                        Some(stage),
                        StageEventKind::RunHalted,
                        format!("{} is waiting on {:?}", stage.label(), waiting_on),
                    ));
                    return RunOutcome::Halted { stage, waiting_on };
                }
            };

            self.emit(StageEvent::new(
                document_id.clone(),
                Some(run_id),
                Some(stage),
                StageEventKind::StageStarted,
                format!("{} started", stage.label()),
            ));

            let started = Instant::now();
            let result = self.executor.execute(document, stage, inputs).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                StageResult::Success { payload, .. } => {
                    self.emit(
                        StageEvent::new(
                            document_id.clone(),
                            Some(run_id),
                            Some(stage),
                            StageEventKind::StageCompleted,
                            format!("{}: {}", stage.label(), payload.summary()),
                        )
                        .with_duration(duration_ms),
                    );
                }
                StageResult::Error { kind, message, .. } => {
                    error!(%document_id, %stage, ?kind, %message, "Stage failed, stopping run");
                    self.emit(
                        StageEvent::new(
                            document_id.clone(),
                            Some(run_id),
                            Some(stage),
                            StageEventKind::StageFailed,
                            format!("{} failed ({})", stage.label(), kind),
                        )
                        .with_duration(duration_ms)
                        .with_error(message.clone()),
                    );
                    self.emit(
                        StageEvent::new(
                            document_id.clone(),
                            Some(run_id),
                            Some(stage),
                            StageEventKind::RunFailed,
                            format!("Run failed at {}", stage),
                        )
                        .with_error(message.clone()),
                    );
                    return RunOutcome::Failed {
                        stage,
                        kind,
                        message,
                    };
                }
                StageResult::Idle | StageResult::Loading { .. } => {
                    warn!(%document_id, %stage, "Executor returned a non-terminal result");
                    return RunOutcome::Halted {
                        stage,
                        waiting_on: Vec::new(),
                    };
                }
            }
        }

        info!(%document_id, %run_id, "Pipeline completed");
        self.emit(StageEvent::new(
            document_id.clone(),
            Some(run_id),
            None,
            StageEventKind::RunCompleted,
            "All stages complete",
        ));
        RunOutcome::Completed
    }

    /// Store a cached payload as a success if it is fresh for its stage
    fn hydrate_from(&self, document_id: &DocumentId, stage: Stage, envelope: CacheEnvelope) -> bool {
        if stage.freshness() == Freshness::Revalidate {
            if let Err(reason) = envelope.payload.validate() {
                debug!(%document_id, %stage, %reason, "Cached payload failed revalidation");
                return false;
            }
        }

        let produced_at = Utc
            .timestamp_millis_opt(envelope.written_at_epoch_ms)
            .single()
            .unwrap_or_else(Utc::now);

        debug!(%document_id, %stage, "Hydrated stage from cache");
        self.store.set(
            document_id,
            stage,
            StageResult::Success {
                payload: envelope.payload,
                produced_at,
            },
        );
        true
    }

    /// Fill every stage of a sample document from its bundle
    fn seed(&self, document_id: &DocumentId, bundle: &SampleBundle) -> RunOutcome {
        let mut seeded: BTreeMap<Stage, StageResult> = BTreeMap::new();

        for stage in STAGE_ORDER {
            let result = match bundle.get(stage) {
                Some(payload) if payload.stage() == stage => StageResult::success(payload.clone()),
                _ if stage == Stage::Extraction => {
                    StageResult::success(StagePayload::Extraction(ExtractionPayload::placeholder()))
                }
                _ => StageResult::error(StageError::malformed(
                    stage,
                    "the sample dataset has no result for this stage",
                )),
            };
            seeded.insert(stage, result);
        }

        for (stage, result) in seeded {
            self.store.set(document_id, stage, result);
        }

        info!(%document_id, "Seeded sample document");
        self.emit(StageEvent::new(
            document_id.clone(),
            None,
            None,
            StageEventKind::DocumentSeeded,
            "Sample document seeded from bundled results",
        ));
        RunOutcome::Seeded
    }
}
