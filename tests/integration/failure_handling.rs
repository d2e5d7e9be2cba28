//! Failure handling tests.
//!
//! Worker errors, timeouts, panics and cancellation all end up as `Failed`
//! records inside a complete result; only structural problems are errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskforge::core::registry::builtin_registry;
use taskforge::orchestration::{Scheduler, SchedulerOptions};
use taskforge::{
    Catalog, Config, Engine, FailurePolicy, RunStatus, SubTask, SubTaskStatus, Worker,
    WorkerRegistry,
};

use crate::fixtures::{
    deps_of, engine_with, subtask, FailingWorker, PanickingWorker, RecordingWorker, SlowWorker,
};

fn failed_with(status: &SubTaskStatus, needle: &str) -> bool {
    matches!(status, SubTaskStatus::Failed { error } if error.contains(needle))
}

fn scheduler(subtasks: &[SubTask], worker: Arc<dyn Worker>, options: SchedulerOptions) -> Scheduler {
    Scheduler::new(
        subtasks,
        &deps_of(subtasks),
        &builtin_registry(),
        WorkerRegistry::with_fallback(worker),
        options,
    )
    .unwrap()
}

/// Test: Scenario D
/// Given a subtask whose sole dependency fails
/// When the run completes under the default policy
/// Then the dependent is Failed and the summary is not all-succeeded
#[tokio::test]
async fn test_failed_dependency_fails_dependent() {
    let engine = engine_with(Arc::new(FailingWorker::for_roles(&["database"])));
    let analysis = engine
        .analyze_task("Design the database schema and add an api endpoint")
        .await
        .unwrap();

    let database = analysis
        .subtasks
        .iter()
        .find(|s| s.role.as_str() == "database")
        .unwrap();
    let backend = analysis
        .subtasks
        .iter()
        .find(|s| s.role.as_str() == "backend")
        .unwrap();
    assert_eq!(analysis.dependencies[&backend.id], vec![database.id]);

    let result = engine.execute_task(&analysis).await.unwrap();

    assert!(failed_with(&result.statuses[&database.id], "refused"));
    assert!(failed_with(&result.statuses[&backend.id], "dependency"));
    assert!(!result.summary.all_succeeded);
    assert_eq!(result.status, RunStatus::PartiallyFailed);
    assert_eq!(result.records.len(), analysis.subtasks.len());
}

/// A failure leaves unrelated branches running under fail-soft.
#[tokio::test]
async fn test_fail_soft_spares_unrelated_branches() {
    let broken = subtask("database", 2);
    let dependent = subtask("backend", 3).with_dependencies(vec![broken.id]);
    let unrelated = subtask("frontend", 2);
    let subtasks = vec![broken.clone(), dependent.clone(), unrelated.clone()];

    let outcome = scheduler(
        &subtasks,
        Arc::new(FailingWorker::for_roles(&["database"])),
        SchedulerOptions::default(),
    )
    .run(CancellationToken::new())
    .await;

    assert_eq!(outcome.statuses[&unrelated.id], SubTaskStatus::Completed);
    assert!(failed_with(&outcome.statuses[&dependent.id], "dependency"));
}

/// Best effort runs dependents of failed prerequisites.
#[tokio::test]
async fn test_best_effort_attempts_dependents() {
    let worker = Arc::new(RecordingWorker::new(Duration::from_millis(1)));
    let broken = subtask("database", 2);
    let dependent = subtask("backend", 3).with_dependencies(vec![broken.id]);
    let subtasks = vec![broken.clone(), dependent.clone()];

    struct Mixed(Arc<RecordingWorker>);

    #[async_trait::async_trait]
    impl Worker for Mixed {
        async fn invoke(
            &self,
            invocation: taskforge::orchestration::Invocation,
        ) -> taskforge::Result<String> {
            if invocation.role.as_str() == "database" {
                return Err(taskforge::Error::Worker("down".to_string()));
            }
            self.0.invoke(invocation).await
        }
    }

    let options = SchedulerOptions {
        policy: FailurePolicy::BestEffort,
        ..SchedulerOptions::default()
    };
    let outcome = scheduler(&subtasks, Arc::new(Mixed(worker.clone())), options)
        .run(CancellationToken::new())
        .await;

    assert!(failed_with(&outcome.statuses[&broken.id], "down"));
    assert_eq!(outcome.statuses[&dependent.id], SubTaskStatus::Completed);
    assert!(worker.span(&dependent.id).is_some());
}

/// Fail fast stops everything after the first failure.
#[tokio::test]
async fn test_fail_fast_stops_the_run() {
    let broken = subtask("database", 2);
    let hanging = subtask("ml", 2);
    let later = subtask("devops", 6).with_dependencies(vec![hanging.id]);
    let subtasks = vec![broken.clone(), hanging.clone(), later.clone()];

    struct BreakOrHang;

    #[async_trait::async_trait]
    impl Worker for BreakOrHang {
        async fn invoke(
            &self,
            invocation: taskforge::orchestration::Invocation,
        ) -> taskforge::Result<String> {
            if invocation.role.as_str() == "database" {
                return Err(taskforge::Error::Worker("broken".to_string()));
            }
            SlowWorker::hanging().invoke(invocation).await
        }
    }

    let options = SchedulerOptions {
        policy: FailurePolicy::FailFast,
        ..SchedulerOptions::default()
    };
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler(&subtasks, Arc::new(BreakOrHang), options).run(CancellationToken::new()),
    )
    .await
    .expect("fail fast did not stop in-flight work");

    assert!(!outcome.cancelled);
    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.records.iter().all(|r| !r.is_success()));
}

/// Test: Fail fast reports the abort to queued subtasks
/// Given two ready `ml` subtasks and a role capacity of one
/// When the running one fails under fail fast
/// Then the queued one fails with the abort reason, not a dependency reason
#[tokio::test]
async fn test_fail_fast_fails_queued_subtasks_with_abort_reason() {
    let first = subtask("ml", 4);
    let queued = subtask("ml", 4);
    let subtasks = vec![first.clone(), queued.clone()];

    let options = SchedulerOptions {
        policy: FailurePolicy::FailFast,
        ..SchedulerOptions::default()
    };
    let outcome = scheduler(&subtasks, Arc::new(FailingWorker::for_roles(&["ml"])), options)
        .run(CancellationToken::new())
        .await;

    assert!(!outcome.cancelled);
    assert!(failed_with(&outcome.statuses[&first.id], "refused"));
    assert!(failed_with(&outcome.statuses[&queued.id], "aborted"));
    assert_eq!(outcome.records.len(), 2);
}

/// Test: Timeouts are failures
/// Given a worker that never answers and a short role timeout
/// When the subtask runs
/// Then it fails with a timeout and the run still completes
#[tokio::test]
async fn test_timeout_marks_subtask_failed() {
    let slow = subtask("backend", 3);
    let fast = subtask("frontend", 3);
    let subtasks = vec![slow.clone(), fast.clone()];

    let mut role_timeouts = HashMap::new();
    role_timeouts.insert(slow.role.clone(), Duration::from_millis(30));
    let options = SchedulerOptions {
        role_timeouts,
        ..SchedulerOptions::default()
    };

    struct HangFor(&'static str);

    #[async_trait::async_trait]
    impl Worker for HangFor {
        async fn invoke(
            &self,
            invocation: taskforge::orchestration::Invocation,
        ) -> taskforge::Result<String> {
            if invocation.role.as_str() == self.0 {
                SlowWorker::hanging().invoke(invocation).await
            } else {
                Ok("quick".to_string())
            }
        }
    }

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler(&subtasks, Arc::new(HangFor("backend")), options).run(CancellationToken::new()),
    )
    .await
    .unwrap();

    assert!(failed_with(&outcome.statuses[&slow.id], "timed out"));
    assert_eq!(outcome.statuses[&fast.id], SubTaskStatus::Completed);
}

/// Engine-level timeout configured in whole seconds.
#[tokio::test]
async fn test_engine_applies_configured_timeout() {
    let config = Config {
        default_timeout_secs: 1,
        ..Config::default()
    };
    let engine = Engine::new(Catalog::default(), config)
        .unwrap()
        .with_workers(WorkerRegistry::with_fallback(Arc::new(SlowWorker::hanging())));

    let analysis = engine.analyze_task("Create a REST API").await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), engine.execute_task(&analysis))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.status, RunStatus::PartiallyFailed);
    assert!(result
        .statuses
        .values()
        .all(|s| failed_with(s, "timed out")));
}

/// Test: Cancellation yields a partial result
/// Given a run whose first stage never finishes
/// When the caller cancels
/// Then every subtask is Failed and the result is marked cancelled
#[tokio::test]
async fn test_cancel_produces_partial_result() {
    let engine = engine_with(Arc::new(SlowWorker::hanging()));
    let analysis = engine
        .analyze_task("Build a full-stack feature")
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.execute_task_with_cancel(&analysis, cancel),
    )
    .await
    .expect("cancellation did not interrupt the run")
    .unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.records.len(), analysis.subtasks.len());
    assert!(result.statuses.values().all(|s| failed_with(s, "cancelled")));

    let history = engine.run_history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].cancelled);
}

/// Cancelling before the run starts still reports every subtask.
#[tokio::test]
async fn test_cancel_before_start() {
    let engine = engine_with(Arc::new(SlowWorker::hanging()));
    let analysis = engine.analyze_task("Create a REST API").await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine
        .execute_task_with_cancel(&analysis, cancel)
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.records.iter().all(|r| !r.is_success()));
}

/// A role without a worker fails its subtasks, not the run.
#[tokio::test]
async fn test_missing_worker_is_a_subtask_failure() {
    let mut workers = WorkerRegistry::new();
    workers.register("database", Arc::new(FailingWorker::for_roles(&[])));
    let engine = Engine::default().with_workers(workers);

    let analysis = engine
        .analyze_task("Design the database schema and add an api endpoint")
        .await
        .unwrap();
    let result = engine.execute_task(&analysis).await.unwrap();

    let backend = analysis
        .subtasks
        .iter()
        .find(|s| s.role.as_str() == "backend")
        .unwrap();
    assert!(failed_with(&result.statuses[&backend.id], "no worker registered"));
    assert_eq!(result.summary.succeeded, 1);
}

/// A panicking worker fails its subtask; the run carries on.
#[tokio::test]
async fn test_panicking_worker_is_contained() {
    let subtasks = vec![subtask("backend", 3)];
    let outcome = scheduler(&subtasks, Arc::new(PanickingWorker), SchedulerOptions::default())
        .run(CancellationToken::new())
        .await;

    assert_eq!(outcome.records.len(), 1);
    assert!(!outcome.records[0].is_success());
}
