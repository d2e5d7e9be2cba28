//! Scheduler for dependency-gated concurrent execution.
//!
//! The Scheduler is a single coordinator that owns all mutable run state:
//! subtask statuses, the completed set and the per-role capacity pool.
//! Worker calls run concurrently on a `JoinSet`; the coordinator wakes only
//! when one of them finishes or the run is cancelled, and each completion
//! immediately decides which direct dependents become ready.

use crate::core::{
    CapabilityRegistry, DependencyGraph, ExecutionRecord, RoleId, SubTask, SubTaskId,
    SubTaskStatus,
};
use crate::error::{Error, Result};
use crate::orchestration::pool::RolePool;
use crate::orchestration::worker::{Invocation, WorkerRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default per-call timeout (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// What happens to dependents when a subtask fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Dependents run only after every prerequisite completed; a failure
    /// fails all transitive dependents without touching other branches.
    FailSoft,
    /// Dependents run once every prerequisite finished, whatever the outcome.
    BestEffort,
    /// The first failure cancels the rest of the run.
    FailFast,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::FailSoft
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailSoft => write!(f, "fail_soft"),
            FailurePolicy::BestEffort => write!(f, "best_effort"),
            FailurePolicy::FailFast => write!(f, "fail_fast"),
        }
    }
}

/// Events emitted by the scheduler for subtask lifecycle changes.
///
/// These events allow external components (like a CLI progress view) to
/// react to state changes without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A subtask was handed to its worker.
    TaskStarted {
        subtask_id: SubTaskId,
        role: RoleId,
    },
    /// A subtask finished successfully.
    TaskCompleted { subtask_id: SubTaskId },
    /// A subtask failed, timed out, was cancelled, or was skipped because
    /// a prerequisite failed.
    TaskFailed {
        subtask_id: SubTaskId,
        error: String,
    },
    /// Every subtask reached a terminal state.
    AllTasksComplete,
}

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub policy: FailurePolicy,
    pub default_timeout: Duration,
    pub role_timeouts: HashMap<RoleId, Duration>,
}

impl SchedulerOptions {
    pub fn timeout_for(&self, role: &RoleId) -> Duration {
        self.role_timeouts
            .get(role)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            role_timeouts: HashMap::new(),
        }
    }
}

/// Final state of a scheduled run.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// One record per subtask, in creation order.
    pub records: Vec<ExecutionRecord>,
    /// Terminal status of every subtask.
    pub statuses: HashMap<SubTaskId, SubTaskStatus>,
    /// Whether the caller cancelled the run.
    pub cancelled: bool,
    pub elapsed: Duration,
}

type Joined = (SubTaskId, Result<String>, Duration);

/// Drives one DAG of subtasks to completion.
pub struct Scheduler {
    /// Subtasks by id.
    subtasks: HashMap<SubTaskId, SubTask>,
    /// Creation order; doubles as the queue tiebreaker.
    order: Vec<SubTaskId>,
    graph: DependencyGraph,
    statuses: HashMap<SubTaskId, SubTaskStatus>,
    /// Prerequisites not yet resolved, per subtask.
    remaining: HashMap<SubTaskId, usize>,
    /// Set of completed subtask ids.
    completed: HashSet<SubTaskId>,
    records: HashMap<SubTaskId, ExecutionRecord>,
    pool: RolePool,
    workers: WorkerRegistry,
    options: SchedulerOptions,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
    /// Maps JoinSet task ids back to subtasks so panics can be attributed.
    running: HashMap<tokio::task::Id, SubTaskId>,
}

impl Scheduler {
    /// Create a scheduler for `subtasks` wired by `dependencies`.
    ///
    /// # Errors
    /// Structural errors ([`Error::UnknownSubtask`], [`Error::CycleDetected`])
    /// and duplicate subtask ids are rejected before anything runs.
    pub fn new(
        subtasks: &[SubTask],
        dependencies: &HashMap<SubTaskId, Vec<SubTaskId>>,
        registry: &CapabilityRegistry,
        workers: WorkerRegistry,
        options: SchedulerOptions,
    ) -> Result<Self> {
        let graph = DependencyGraph::build(subtasks, dependencies)?;
        if graph.node_count() != subtasks.len() {
            return Err(Error::Validation("duplicate subtask ids".to_string()));
        }
        graph.topological_order()?;

        let order: Vec<SubTaskId> = subtasks.iter().map(|s| s.id).collect();
        let remaining = order
            .iter()
            .map(|id| (*id, graph.dependencies_of(id).len()))
            .collect::<HashMap<_, _>>();
        let statuses = remaining
            .iter()
            .map(|(id, count)| (*id, SubTaskStatus::initial(*count)))
            .collect();

        Ok(Self {
            subtasks: subtasks.iter().map(|s| (s.id, s.clone())).collect(),
            order,
            graph,
            statuses,
            remaining,
            completed: HashSet::new(),
            records: HashMap::new(),
            pool: RolePool::new(registry),
            workers,
            options,
            event_tx: None,
            running: HashMap::new(),
        })
    }

    /// Emit lifecycle events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Get the set of completed subtask ids.
    pub fn completed(&self) -> &HashSet<SubTaskId> {
        &self.completed
    }

    pub fn status(&self, id: &SubTaskId) -> Option<&SubTaskStatus> {
        self.statuses.get(id)
    }

    /// Check if every subtask is terminal.
    pub fn all_finished(&self) -> bool {
        self.statuses.values().all(SubTaskStatus::is_terminal)
    }

    /// Run until every subtask is terminal or the run is cancelled.
    ///
    /// Cancelling `cancel` signals every in-flight worker call and fails
    /// every subtask that has not started; the outcome is still complete,
    /// with one record per subtask.
    pub async fn run(mut self, cancel: CancellationToken) -> ScheduleOutcome {
        let started = Instant::now();
        let run_token = cancel.child_token();
        let mut tasks: JoinSet<Joined> = JoinSet::new();
        let mut stopped = false;

        info!(
            subtasks = self.order.len(),
            policy = %self.options.policy,
            "scheduler starting"
        );

        for id in self.order.clone() {
            if self.remaining.get(&id) == Some(&0) {
                self.mark_ready(id);
            }
        }

        loop {
            if !stopped && !run_token.is_cancelled() {
                self.dispatch(&mut tasks, &run_token);
            }
            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = run_token.cancelled(), if !stopped => {
                    stopped = true;
                    let reason = if cancel.is_cancelled() {
                        "run cancelled".to_string()
                    } else {
                        "run aborted after a failure".to_string()
                    };
                    warn!(%reason, in_flight = tasks.len(), "stopping dispatch");
                    self.fail_unstarted(&reason);
                }
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((task_id, (id, result, elapsed)))) => {
                        self.running.remove(&task_id);
                        if self.finish(id, result, elapsed) {
                            run_token.cancel();
                        }
                    }
                    Some(Err(join_error)) => {
                        if let Some(id) = self.running.remove(&join_error.id()) {
                            let error = Error::TaskJoin(join_error.to_string());
                            if self.finish(id, Err(error), Duration::ZERO) {
                                run_token.cancel();
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        // The loop can end before the cancelled arm ever ran, e.g. when the
        // last in-flight call fails under FailFast with work still queued.
        if run_token.is_cancelled() && !stopped {
            let reason = if cancel.is_cancelled() {
                "run cancelled"
            } else {
                "run aborted after a failure"
            };
            self.fail_unstarted(reason);
        }

        // Nothing should be left; anything that is could never have run.
        let stranded: Vec<SubTaskId> = self
            .order
            .iter()
            .filter(|id| !self.statuses.get(*id).is_some_and(SubTaskStatus::is_terminal))
            .copied()
            .collect();
        for id in stranded {
            warn!(subtask = %id.short(), "subtask never became ready");
            self.record_failure(id, "prerequisites never resolved".to_string(), Duration::ZERO);
        }

        self.emit(SchedulerEvent::AllTasksComplete);

        let records: Vec<ExecutionRecord> = self
            .order
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect();
        let elapsed = started.elapsed();
        info!(
            completed = self.completed.len(),
            failed = records.len() - self.completed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scheduler finished"
        );

        ScheduleOutcome {
            records,
            statuses: self.statuses,
            cancelled: cancel.is_cancelled(),
            elapsed,
        }
    }

    fn mark_ready(&mut self, id: SubTaskId) {
        let Some(subtask) = self.subtasks.get(&id) else {
            return;
        };
        let sequence = self.order.iter().position(|x| *x == id).unwrap_or(usize::MAX);
        self.pool
            .enqueue(&subtask.role, subtask.priority, sequence, id);
        self.statuses.insert(id, SubTaskStatus::Ready);
        debug!(subtask = %id.short(), role = %subtask.role, "subtask ready");
    }

    /// Start every ready subtask that has a free role slot.
    fn dispatch(&mut self, tasks: &mut JoinSet<Joined>, run_token: &CancellationToken) {
        for (role, id) in self.pool.take_dispatchable() {
            let Some(subtask) = self.subtasks.get(&id) else {
                continue;
            };

            if self.options.policy != FailurePolicy::BestEffort {
                debug_assert!(self
                    .graph
                    .dependencies_of(&id)
                    .iter()
                    .all(|dep| self.completed.contains(dep)));
            }

            let timeout = self.options.timeout_for(&role);
            let invocation = Invocation::for_subtask(subtask, timeout);
            let worker = self.workers.resolve(&role);
            let token = run_token.child_token();
            let worker_role = role.clone();

            let handle = tasks.spawn(async move {
                let started = Instant::now();
                let result = match worker {
                    None => Err(Error::Worker(format!(
                        "no worker registered for role {}",
                        worker_role
                    ))),
                    Some(worker) => tokio::select! {
                        _ = token.cancelled() => Err(Error::Cancelled),
                        res = tokio::time::timeout(timeout, worker.invoke(invocation)) => {
                            res.unwrap_or_else(|_| Err(Error::Timeout(timeout)))
                        }
                    },
                };
                (id, result, started.elapsed())
            });

            self.running.insert(handle.id(), id);
            self.statuses.insert(id, SubTaskStatus::Running);
            debug!(subtask = %id.short(), %role, in_flight = self.pool.in_flight(&role), "dispatched");
            self.emit(SchedulerEvent::TaskStarted {
                subtask_id: id,
                role,
            });
        }
    }

    /// Handle a finished worker call. Returns true when the run must stop.
    fn finish(&mut self, id: SubTaskId, result: Result<String>, elapsed: Duration) -> bool {
        let Some(role) = self.subtasks.get(&id).map(|s| s.role.clone()) else {
            return false;
        };
        self.pool.release(&role);

        match result {
            Ok(output) => {
                self.record_success(id, output, elapsed);
                self.resolve_dependents(id);
                false
            }
            Err(error) => {
                let reason = error.to_string();
                warn!(subtask = %id.short(), %role, %reason, "subtask failed");
                self.record_failure(id, reason, elapsed);
                match self.options.policy {
                    FailurePolicy::FailSoft => {
                        self.propagate_failure(id);
                        false
                    }
                    FailurePolicy::BestEffort => {
                        self.resolve_dependents(id);
                        false
                    }
                    FailurePolicy::FailFast => {
                        self.propagate_failure(id);
                        !matches!(error, Error::Cancelled)
                    }
                }
            }
        }
    }

    /// One prerequisite of each direct dependent is resolved.
    fn resolve_dependents(&mut self, id: SubTaskId) {
        for dependent in self.graph.dependents_of(&id) {
            let Some(count) = self.remaining.get_mut(&dependent) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.statuses.get(&dependent) == Some(&SubTaskStatus::Pending) {
                self.mark_ready(dependent);
            }
        }
    }

    /// Fail every transitive dependent of `id` that has not finished.
    fn propagate_failure(&mut self, id: SubTaskId) {
        let mut stack = vec![id];
        while let Some(failed) = stack.pop() {
            for dependent in self.graph.dependents_of(&failed) {
                let pending = self
                    .statuses
                    .get(&dependent)
                    .is_some_and(SubTaskStatus::can_start);
                if pending {
                    debug!(subtask = %dependent.short(), cause = %failed.short(), "propagating failure");
                    self.record_failure(
                        dependent,
                        format!("dependency {} failed", failed.short()),
                        Duration::ZERO,
                    );
                    stack.push(dependent);
                }
            }
        }
    }

    /// Fail everything that has not started yet.
    fn fail_unstarted(&mut self, reason: &str) {
        self.pool.drain_queued();
        let unstarted: Vec<SubTaskId> = self
            .order
            .iter()
            .filter(|id| self.statuses.get(*id).is_some_and(SubTaskStatus::can_start))
            .copied()
            .collect();
        for id in unstarted {
            self.record_failure(id, reason.to_string(), Duration::ZERO);
        }
    }

    fn record_success(&mut self, id: SubTaskId, output: String, elapsed: Duration) {
        let Some(subtask) = self.subtasks.get(&id) else {
            return;
        };
        debug!(subtask = %id.short(), role = %subtask.role, elapsed_ms = elapsed.as_millis() as u64, "subtask completed");
        self.records
            .insert(id, ExecutionRecord::succeeded(subtask, output, elapsed));
        self.statuses.insert(id, SubTaskStatus::Completed);
        self.completed.insert(id);
        self.emit(SchedulerEvent::TaskCompleted { subtask_id: id });
    }

    fn record_failure(&mut self, id: SubTaskId, reason: String, elapsed: Duration) {
        let Some(subtask) = self.subtasks.get(&id) else {
            return;
        };
        self.records
            .insert(id, ExecutionRecord::failed(subtask, &reason, elapsed));
        self.statuses.insert(
            id,
            SubTaskStatus::Failed {
                error: reason.clone(),
            },
        );
        self.emit(SchedulerEvent::TaskFailed {
            subtask_id: id,
            error: reason,
        });
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
