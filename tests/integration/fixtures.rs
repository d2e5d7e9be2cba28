//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted workers (barrier, failing, slow, recording, panicking)
//! - Hand-built subtask graphs
//! - Engines wired to a single worker

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Barrier;

use taskforge::core::{Domain, RoleId, SubTask, SubTaskId};
use taskforge::orchestration::{Invocation, MetricsSink, RunRecord, Worker};
use taskforge::{Engine, Error, Result, WorkerRegistry};

/// Worker that waits on a shared barrier before succeeding.
///
/// A run only finishes if `parties` invocations are in flight at once.
pub struct BarrierWorker {
    barrier: Barrier,
}

impl BarrierWorker {
    pub fn new(parties: usize) -> Self {
        Self {
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl Worker for BarrierWorker {
    async fn invoke(&self, invocation: Invocation) -> Result<String> {
        self.barrier.wait().await;
        Ok(format!("met at barrier: {}", invocation.role))
    }
}

/// Worker that fails for the listed roles and succeeds otherwise.
pub struct FailingWorker {
    failing: HashSet<RoleId>,
}

impl FailingWorker {
    pub fn for_roles(roles: &[&str]) -> Self {
        Self {
            failing: roles.iter().map(|r| RoleId::new(r)).collect(),
        }
    }
}

#[async_trait]
impl Worker for FailingWorker {
    async fn invoke(&self, invocation: Invocation) -> Result<String> {
        if self.failing.contains(&invocation.role) {
            Err(Error::Worker(format!("{} refused", invocation.role)))
        } else {
            Ok(format!("done: {}", invocation.role))
        }
    }
}

/// Worker that sleeps for a fixed time.
pub struct SlowWorker {
    delay: Duration,
}

impl SlowWorker {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Never finishes on its own within a test.
    pub fn hanging() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl Worker for SlowWorker {
    async fn invoke(&self, _invocation: Invocation) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("slow but done".to_string())
    }
}

/// Worker that panics mid-call.
pub struct PanickingWorker;

#[async_trait]
impl Worker for PanickingWorker {
    async fn invoke(&self, _invocation: Invocation) -> Result<String> {
        panic!("worker blew up");
    }
}

/// Start and end of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub start: Instant,
    pub end: Instant,
}

/// Worker that records when each subtask ran and how many overlapped.
pub struct RecordingWorker {
    delay: Duration,
    spans: Mutex<HashMap<SubTaskId, Span>>,
    active: Mutex<HashMap<RoleId, usize>>,
    peak: Mutex<HashMap<RoleId, usize>>,
    total_active: AtomicUsize,
    total_peak: AtomicUsize,
}

impl RecordingWorker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            spans: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            peak: Mutex::new(HashMap::new()),
            total_active: AtomicUsize::new(0),
            total_peak: AtomicUsize::new(0),
        }
    }

    pub fn span(&self, id: &SubTaskId) -> Option<Span> {
        self.spans.lock().unwrap().get(id).copied()
    }

    pub fn invocations(&self) -> usize {
        self.spans.lock().unwrap().len()
    }

    /// Most invocations of `role` seen running at once.
    pub fn peak_for(&self, role: &str) -> usize {
        self.peak
            .lock()
            .unwrap()
            .get(&RoleId::new(role))
            .copied()
            .unwrap_or(0)
    }

    /// Most invocations seen running at once across all roles.
    pub fn peak_total(&self) -> usize {
        self.total_peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for RecordingWorker {
    async fn invoke(&self, invocation: Invocation) -> Result<String> {
        let start = Instant::now();
        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(invocation.role.clone()).or_insert(0);
            *count += 1;
            let mut peak = self.peak.lock().unwrap();
            let role_peak = peak.entry(invocation.role.clone()).or_insert(0);
            *role_peak = (*role_peak).max(*count);
        }
        let now = self.total_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.total_active.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.active.lock().unwrap().get_mut(&invocation.role) {
            *count -= 1;
        }
        self.spans.lock().unwrap().insert(
            invocation.subtask_id,
            Span {
                start,
                end: Instant::now(),
            },
        );
        Ok(format!("recorded: {}", invocation.role))
    }
}

/// Sink that keeps every record it receives.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<RunRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<RunRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl MetricsSink for CollectingSink {
    fn record_run(&self, record: &RunRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Engine with the built-in catalog sending every role to `worker`.
pub fn engine_with(worker: Arc<dyn Worker>) -> Engine {
    Engine::default().with_workers(WorkerRegistry::with_fallback(worker))
}

/// Subtask for `role` at `priority` with a one second estimate.
pub fn subtask(role: &str, priority: u32) -> SubTask {
    SubTask::new(role, Domain::Backend, &format!("{} work", role))
        .with_priority(priority)
        .with_estimate(Duration::from_secs(1))
}

/// Dependency map taken from the subtasks' own lists.
pub fn deps_of(subtasks: &[SubTask]) -> HashMap<SubTaskId, Vec<SubTaskId>> {
    subtasks
        .iter()
        .map(|s| (s.id, s.dependencies.clone()))
        .collect()
}

/// Task texts covering every built-in pattern plus a few oddities.
pub fn sample_tasks() -> Vec<&'static str> {
    vec![
        "Create a REST API for user management",
        "Build an enterprise-scale real-time distributed chat system with authentication",
        "Design a wireframe for the onboarding flow",
        "Optimize slow database queries on the orders table",
        "Set up a CI/CD pipeline with Docker and Kubernetes",
        "Add end-to-end test coverage for checkout",
        "Train a machine learning model for churn prediction",
        "Ship a native iOS and Android app",
        "Implement multiplayer physics for the game",
        "Write firmware for the temperature sensor",
        "Refactor the legacy billing module to pay down tech debt",
        "Audit payment handling for credential leaks",
        "Do the thing",
        "",
        "🚀✨ ünïcödé ταχύτητα",
    ]
}
