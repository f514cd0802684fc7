//! Cancellation Integration Tests
//!
//! Cancelling a run drops the in-flight call, resets the stage to idle,
//! writes nothing and frees the document for a new run.

mod common;

use std::sync::Arc;

use common::{live_document, orchestrator_with, wait_for_loading, Behavior, ScriptedCollaborator};
use paperflow::core::{CacheKey, DurableCache, MemoryCache, StageTimeouts, SCHEMA_VERSION};
use paperflow::domain::{RunOutcome, Stage, StageEventKind, StageStatus};

#[tokio::test]
async fn test_cancel_releases_registry_and_resets_stage() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.script(Stage::Claims, Behavior::Hang);

    let cache = Arc::new(MemoryCache::new());
    let orchestrator = orchestrator_with(collaborator.clone(), cache.clone(), StageTimeouts::default());
    let doc = live_document("d1");

    let run = orchestrator.start_run(&doc, None);
    wait_for_loading(&orchestrator, &doc.id, Stage::Claims).await;

    assert!(orchestrator.cancel(&doc.id));
    assert_eq!(run.wait().await, RunOutcome::Cancelled);
    assert!(!orchestrator.is_running(&doc.id));

    let snap = orchestrator.snapshot(&doc.id);
    assert_eq!(snap.status(Stage::Extraction), StageStatus::Success);
    assert_eq!(snap.status(Stage::Claims), StageStatus::Idle);
    assert!(snap.current_stage().is_none());

    let claims_key = CacheKey::new(doc.id.clone(), Stage::Claims, SCHEMA_VERSION);
    assert!(!cache.contains(&claims_key));
    assert!(cache.read(&claims_key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_run_after_cancel() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.script(Stage::SimilarPapers, Behavior::Hang);

    let orchestrator = orchestrator_with(
        collaborator.clone(),
        Arc::new(MemoryCache::new()),
        StageTimeouts::default(),
    );
    let doc = live_document("d1");

    let first = orchestrator.start_run(&doc, None);
    wait_for_loading(&orchestrator, &doc.id, Stage::SimilarPapers).await;
    first.cancel();
    assert_eq!(first.wait().await, RunOutcome::Cancelled);

    let second = orchestrator.start_run(&doc, None);
    assert_eq!(second.wait().await, RunOutcome::Completed);

    assert_eq!(collaborator.calls(Stage::Extraction), 1);
    assert_eq!(collaborator.calls(Stage::SimilarPapers), 2);
}

#[tokio::test]
async fn test_cancel_without_run() {
    let orchestrator = common::orchestrator(ScriptedCollaborator::new());
    assert!(!orchestrator.cancel(&live_document("idle").id));
}

#[tokio::test]
async fn test_cancel_emits_event() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.script(Stage::Extraction, Behavior::Hang);

    let orchestrator = common::orchestrator(collaborator);
    let mut events = orchestrator.subscribe();
    let doc = live_document("d1");

    let run = orchestrator.start_run(&doc, None);
    wait_for_loading(&orchestrator, &doc.id, Stage::Extraction).await;
    run.cancel();
    run.wait().await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(kinds.first(), Some(&StageEventKind::RunStarted));
    assert_eq!(kinds.last(), Some(&StageEventKind::RunCancelled));
}

#[tokio::test]
async fn test_forget_cancels_and_purges() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.script(Stage::Contacts, Behavior::Hang);

    let cache = Arc::new(MemoryCache::new());
    let orchestrator = orchestrator_with(collaborator.clone(), cache.clone(), StageTimeouts::default());
    let doc = live_document("d1");

    let _run = orchestrator.start_run(&doc, None);
    wait_for_loading(&orchestrator, &doc.id, Stage::Contacts).await;
    assert!(!cache.is_empty());

    orchestrator.forget(&doc.id, true).await;

    assert!(!orchestrator.is_running(&doc.id));
    assert!(cache.is_empty());
    let snap = orchestrator.snapshot(&doc.id);
    assert!(Stage::ALL
        .iter()
        .all(|stage| snap.status(*stage) == StageStatus::Idle));
}
