mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tidepool_sync::{DEBOUNCE_WINDOW, SyncError, SyncEvent, SyncPhase, SyncScheduler};
use tidepool_types::ProjectId;
use tokio::sync::Semaphore;
use tokio::task::yield_now;
use tokio::time::advance;

/// Gives spawned scheduler tasks enough turns to reach their next await.
async fn settle() {
    for _ in 0..50 {
        yield_now().await;
    }
}

// ── Debouncing ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_changes_collapses_into_one_pass() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "v1").await.unwrap();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    for _ in 0..5 {
        scheduler.notify_change(project).await;
    }
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Debouncing));

    advance(DEBOUNCE_WINDOW).await;
    settle().await;

    assert_eq!(events.try_recv().unwrap(), SyncEvent::Started { project });
    match events.try_recv().unwrap() {
        SyncEvent::Completed { outcome, .. } => assert_eq!(outcome.synced, 1),
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(events.try_recv().is_err(), "a burst runs exactly one pass");
    assert_eq!(store.commit_calls(), 1);
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Idle));
}

#[tokio::test(start_paused = true)]
async fn later_changes_push_the_window_out() {
    let (project, fs, _store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "v1").await.unwrap();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    scheduler.notify_change(project).await;
    advance(Duration::from_secs(3)).await;
    settle().await;
    scheduler.notify_change(project).await;

    // The original deadline passes without a sync.
    advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(events.try_recv().is_err(), "window was extended");
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Debouncing));

    // The extended deadline fires.
    advance(Duration::from_secs(3)).await;
    settle().await;
    assert!(matches!(events.try_recv().unwrap(), SyncEvent::Started { .. }));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::Completed { .. }
    ));
    assert!(events.try_recv().is_err());
}

// ── One pass per project ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn expiry_during_a_pass_is_dropped() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "v1").await.unwrap();
    let gate = Arc::new(Semaphore::new(0));
    store.gate_uploads(gate.clone());
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_now(project).await }
    });
    settle().await;
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Syncing));
    assert_eq!(events.try_recv().unwrap(), SyncEvent::Started { project });

    // A change lands and its whole window elapses while the pass is held.
    scheduler.notify_change(project).await;
    advance(DEBOUNCE_WINDOW).await;
    settle().await;

    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Syncing));
    assert!(events.try_recv().is_err(), "dropped expiry starts no pass");

    gate.add_permits(16);
    let outcome = runner.await.unwrap().unwrap();
    assert_eq!(outcome.synced, 1);
    settle().await;

    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Idle));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::Completed { .. }
    ));
    assert!(events.try_recv().is_err());
    assert_eq!(store.commit_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_now_rejects_while_a_pass_runs() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "v1").await.unwrap();
    let gate = Arc::new(Semaphore::new(0));
    store.gate_uploads(gate.clone());
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;

    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_now(project).await }
    });
    settle().await;

    let second = scheduler.run_now(project).await;
    assert!(matches!(second, Err(SyncError::SyncInFlight(p)) if p == project));

    gate.add_permits(16);
    let outcome = runner.await.unwrap().unwrap();
    assert_eq!(outcome.synced, 1);
}

#[tokio::test]
async fn run_now_requires_registration() {
    let scheduler = SyncScheduler::new();
    let ghost = ProjectId::new();
    assert!(matches!(
        scheduler.run_now(ghost).await,
        Err(SyncError::ProjectNotRegistered(p)) if p == ghost
    ));
}

#[tokio::test(start_paused = true)]
async fn change_during_a_pass_schedules_a_followup() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/doc.md", "v1").await.unwrap();
    let gate = Arc::new(Semaphore::new(0));
    store.gate_uploads(gate.clone());
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_now(project).await }
    });
    settle().await;

    // Edit and notify while the first pass is held mid-flight.
    fs.seed_text("/doc.md", "v2").await.unwrap();
    scheduler.notify_change(project).await;
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Syncing));

    gate.add_permits(16);
    runner.await.unwrap().unwrap();
    settle().await;
    assert_eq!(
        scheduler.phase(project).await,
        Some(SyncPhase::Debouncing),
        "pending change re-arms the window"
    );

    advance(DEBOUNCE_WINDOW).await;
    settle().await;

    assert_eq!(store.text_at(project, "/doc.md").unwrap().content, "v2");
    assert_eq!(store.commit_calls(), 2);
    assert!(matches!(events.try_recv().unwrap(), SyncEvent::Started { .. }));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::Completed { .. }
    ));
    assert!(matches!(events.try_recv().unwrap(), SyncEvent::Started { .. }));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::Completed { .. }
    ));
    assert!(events.try_recv().is_err());
}

// ── Events and registry ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failing_pass_emits_a_failed_event() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "a").await.unwrap();
    store.expire_credentials();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    scheduler.notify_change(project).await;
    advance(DEBOUNCE_WINDOW).await;
    settle().await;

    assert!(matches!(events.try_recv().unwrap(), SyncEvent::Started { .. }));
    match events.try_recv().unwrap() {
        SyncEvent::Failed { message, .. } => assert!(message.contains("unauthorized")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Idle));
}

#[tokio::test(start_paused = true)]
async fn deregister_drops_pending_work() {
    let (project, fs, _store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "a").await.unwrap();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine).await;
    let mut events = scheduler.subscribe();

    scheduler.notify_change(project).await;
    scheduler.deregister(project).await;
    assert_eq!(scheduler.phase(project).await, None);

    advance(DEBOUNCE_WINDOW).await;
    settle().await;
    assert!(events.try_recv().is_err(), "no pass for a deregistered project");

    // Late notifications are dropped silently.
    scheduler.notify_change(project).await;
    assert!(scheduler.registered_projects().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reregistering_keeps_the_pending_window() {
    let (project, fs, store, _blobs, engine) = common::engine_fixture();
    fs.seed_text("/a.txt", "a").await.unwrap();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine.clone()).await;
    let mut events = scheduler.subscribe();

    scheduler.notify_change(project).await;
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Debouncing));

    // Swapping the engine mid-window keeps the slot state.
    scheduler.register(engine).await;
    assert_eq!(scheduler.phase(project).await, Some(SyncPhase::Debouncing));

    advance(DEBOUNCE_WINDOW).await;
    settle().await;
    assert!(matches!(events.try_recv().unwrap(), SyncEvent::Started { .. }));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::Completed { .. }
    ));
    assert_eq!(store.commit_calls(), 1);
}

#[tokio::test]
async fn registry_tracks_projects() {
    let (project_a, _fs_a, _store_a, _blobs_a, engine_a) = common::engine_fixture();
    let (project_b, _fs_b, _store_b, _blobs_b, engine_b) = common::engine_fixture();
    let scheduler = SyncScheduler::new();
    scheduler.register(engine_a).await;
    scheduler.register(engine_b).await;

    let projects = scheduler.registered_projects().await;
    assert_eq!(projects.len(), 2);
    assert!(projects.contains(&project_a));
    assert!(projects.contains(&project_b));
    assert_eq!(scheduler.phase(project_a).await, Some(SyncPhase::Idle));

    scheduler.deregister(project_a).await;
    assert_eq!(scheduler.registered_projects().await, vec![project_b]);
    assert_eq!(scheduler.phase(project_a).await, None);
}
