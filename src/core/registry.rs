//! Run registry: at most one in-flight run per document.
//!
//! Registering returns either the run already in flight for the document
//! (callers join it) or a fresh `RunLease`. The lease is the only way to
//! leave the registry: completing it or dropping it releases the entry
//! exactly once, on every exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{DocumentId, RunOutcome, Stage};

/// Shared view of an in-flight run
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Unique identifier for this run
    pub run_id: Uuid,

    /// Document being processed
    pub document_id: DocumentId,

    /// Resume directive the run was started with
    pub resume_from: Option<Stage>,

    outcome: watch::Receiver<Option<RunOutcome>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    /// Handle for work that completed synchronously and never registered
    pub(crate) fn finished(document_id: DocumentId, outcome: RunOutcome) -> Self {
        let (_, outcome_rx) = watch::channel(Some(outcome));
        let (cancel_tx, _) = watch::channel(false);

        Self {
            run_id: Uuid::new_v4(),
            document_id,
            resume_from: None,
            outcome: outcome_rx,
            cancel: Arc::new(cancel_tx),
        }
    }

    /// Wait for the run's terminal outcome
    pub async fn wait(mut self) -> RunOutcome {
        loop {
            if let Some(outcome) = self.outcome.borrow().clone() {
                return outcome;
            }
            if self.outcome.changed().await.is_err() {
                // Lease dropped without completing (task panicked or was torn down)
                return self
                    .outcome
                    .borrow()
                    .clone()
                    .unwrap_or(RunOutcome::Cancelled);
            }
        }
    }

    /// Ask the run to stop; the in-flight collaborator call is dropped
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Outcome, if the run already finished
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.borrow().clone()
    }
}

/// Exclusive right to run the pipeline for one document
pub struct RunLease {
    registry: Arc<RunRegistry>,
    document_id: DocumentId,
    run_id: Uuid,
    outcome: Option<watch::Sender<Option<RunOutcome>>>,
    cancel: watch::Receiver<bool>,
}

impl RunLease {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&mut self) {
        loop {
            if *self.cancel.borrow() {
                return;
            }
            if self.cancel.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Release the registry entry, then publish the outcome
    pub fn complete(mut self, outcome: RunOutcome) {
        self.registry.release(&self.document_id, self.run_id);
        if let Some(tx) = self.outcome.take() {
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if self.outcome.is_some() {
            debug!(document_id = %self.document_id, run_id = %self.run_id, "Run lease dropped without outcome");
            self.registry.release(&self.document_id, self.run_id);
        }
    }
}

/// Result of `RunRegistry::register`
pub enum Registration {
    /// A run was already in flight; join it
    Joined(RunHandle),

    /// A new run was registered; the caller must drive it with the lease
    Started { handle: RunHandle, lease: RunLease },
}

/// In-flight runs, keyed by document
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<DocumentId, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, RunHandle>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The run in flight for a document, if any
    pub fn acquire(&self, document_id: &DocumentId) -> Option<RunHandle> {
        self.lock().get(document_id).cloned()
    }

    /// Join the in-flight run or register a new one, atomically
    pub fn register(self: &Arc<Self>, document_id: &DocumentId, resume_from: Option<Stage>) -> Registration {
        let mut runs = self.lock();

        if let Some(existing) = runs.get(document_id) {
            return Registration::Joined(existing.clone());
        }

        let run_id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = RunHandle {
            run_id,
            document_id: document_id.clone(),
            resume_from,
            outcome: outcome_rx,
            cancel: Arc::new(cancel_tx),
        };
        runs.insert(document_id.clone(), handle.clone());

        let lease = RunLease {
            registry: Arc::clone(self),
            document_id: document_id.clone(),
            run_id,
            outcome: Some(outcome_tx),
            cancel: cancel_rx,
        };

        Registration::Started { handle, lease }
    }

    /// Remove the entry for `document_id` if it still belongs to `run_id`
    pub fn release(&self, document_id: &DocumentId, run_id: Uuid) -> bool {
        let mut runs = self.lock();
        match runs.get(document_id) {
            Some(handle) if handle.run_id == run_id => {
                runs.remove(document_id);
                true
            }
            _ => false,
        }
    }

    /// Request cancellation of the document's run; false when none is in flight
    pub fn cancel(&self, document_id: &DocumentId) -> bool {
        match self.acquire(document_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, document_id: &DocumentId) -> bool {
        self.lock().contains_key(document_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
