//! Parallel execution correctness tests.
//!
//! These tests verify that the scheduler overlaps independent subtasks,
//! gates dependents on their prerequisites, and honours role capacity.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use taskforge::core::registry::builtin_registry;
use taskforge::orchestration::{ScheduleOutcome, Scheduler, SchedulerOptions};
use taskforge::{RunStatus, SimulatedWorker, SubTask, SubTaskStatus, Worker, WorkerRegistry};

use crate::fixtures::{deps_of, engine_with, subtask, BarrierWorker, RecordingWorker};

async fn run(subtasks: &[SubTask], worker: Arc<dyn Worker>) -> ScheduleOutcome {
    Scheduler::new(
        subtasks,
        &deps_of(subtasks),
        &builtin_registry(),
        WorkerRegistry::with_fallback(worker),
        SchedulerOptions::default(),
    )
    .unwrap()
    .run(CancellationToken::new())
    .await
}

/// Test: Scenario C
/// Given two same-tier subtasks with no edge between them
/// When the scheduler runs them on workers that wait for each other
/// Then both finish, so they were in flight together
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_tier_subtasks_overlap() {
    let subtasks = vec![subtask("frontend", 4), subtask("mobile", 4)];

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run(&subtasks, Arc::new(BarrierWorker::new(2))),
    )
    .await
    .expect("same-tier subtasks were serialized");

    assert!(outcome.records.iter().all(|r| r.is_success()));
}

/// Same role, capacity 3: two subtasks still overlap.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_role_overlaps_within_capacity() {
    let subtasks = vec![subtask("backend", 3), subtask("backend", 3)];

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run(&subtasks, Arc::new(BarrierWorker::new(2))),
    )
    .await
    .expect("backend subtasks were serialized despite spare capacity");

    assert_eq!(outcome.records.len(), 2);
}

/// Test: Role capacity is a queue, not an error
/// Given four ready subtasks for a role with capacity 1
/// When the scheduler runs
/// Then at most one runs at a time and all complete
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_role_capacity_limits_concurrency() {
    let worker = Arc::new(RecordingWorker::new(Duration::from_millis(20)));
    let subtasks: Vec<SubTask> = (0..4).map(|_| subtask("ml", 4)).collect();

    let outcome = run(&subtasks, worker.clone()).await;

    assert!(outcome.records.iter().all(|r| r.is_success()));
    assert_eq!(worker.invocations(), 4);
    assert_eq!(worker.peak_for("ml"), 1);
}

/// Capacity is per role: a full role does not hold back others.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_is_per_role() {
    let worker = Arc::new(RecordingWorker::new(Duration::from_millis(30)));
    let mut subtasks: Vec<SubTask> = (0..5).map(|_| subtask("backend", 3)).collect();
    subtasks.push(subtask("game", 3));

    let outcome = run(&subtasks, worker.clone()).await;

    assert_eq!(outcome.records.len(), 6);
    assert!(worker.peak_for("backend") <= 3);
    assert_eq!(worker.peak_for("game"), 1);
    assert!(worker.peak_total() >= 2);
}

/// Test: Dependents wait for prerequisites
/// Given a diamond of subtasks
/// When the scheduler runs
/// Then no subtask starts before all of its prerequisites ended
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dependents_start_after_prerequisites() {
    let worker = Arc::new(RecordingWorker::new(Duration::from_millis(15)));
    let design = subtask("uiux", 1);
    let schema = subtask("database", 2).with_dependencies(vec![design.id]);
    let api = subtask("backend", 3).with_dependencies(vec![design.id]);
    let ui = subtask("frontend", 4).with_dependencies(vec![schema.id, api.id]);
    let subtasks = vec![design, schema, api, ui];

    let outcome = run(&subtasks, worker.clone()).await;
    assert!(outcome.records.iter().all(|r| r.is_success()));

    for subtask in &subtasks {
        let span = worker.span(&subtask.id).unwrap();
        for dep in &subtask.dependencies {
            let prerequisite = worker.span(dep).unwrap();
            assert!(
                prerequisite.end <= span.start,
                "{} started before {} finished",
                subtask.role,
                dep.short()
            );
        }
    }
}

/// Queued subtasks of one role start in priority then creation order.
#[tokio::test]
async fn test_queue_order_within_role() {
    let worker = Arc::new(RecordingWorker::new(Duration::from_millis(5)));
    let late_tier = subtask("ml", 5);
    let first = subtask("ml", 2);
    let second = subtask("ml", 2);
    let subtasks = vec![late_tier.clone(), first.clone(), second.clone()];

    run(&subtasks, worker.clone()).await;

    let start = |s: &SubTask| worker.span(&s.id).unwrap().start;
    assert!(start(&first) < start(&second));
    assert!(start(&second) < start(&late_tier));
}

/// Independent tasks can be executed on one engine at the same time.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_engine_calls() {
    let engine = engine_with(Arc::new(SimulatedWorker::new(0.0)));
    let texts = [
        "Create a REST API for user management",
        "Design a wireframe for onboarding",
        "Set up a deployment pipeline",
        "Build an enterprise-scale real-time distributed chat system with authentication",
    ];

    let runs = texts.iter().map(|text| {
        let engine = engine.clone();
        async move {
            let analysis = engine.analyze_task(text).await?;
            engine.execute_task(&analysis).await
        }
    });
    let results = join_all(runs).await;

    for result in &results {
        let result = result.as_ref().unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result
            .statuses
            .values()
            .all(|s| *s == SubTaskStatus::Completed));
    }
    assert_eq!(engine.run_history().await.len(), texts.len());
}
