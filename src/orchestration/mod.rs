//! The analysis and execution pipeline.
//!
//! Text flows through the [`TaskClassifier`], [`RoleSelector`] and
//! [`Decomposer`] to become a [`TaskAnalysis`](crate::core::TaskAnalysis).
//! The [`Scheduler`] runs its subtasks on registered [`Worker`]s, gated by
//! dependencies and per-role capacity; [`aggregate`] and the
//! [`MetricsRecorder`] turn the outcome into a [`RunResult`] and rolling
//! statistics.

mod aggregator;
mod classifier;
mod decomposer;
mod metrics;
mod plan;
mod pool;
mod scheduler;
mod selector;
mod worker;

pub use aggregator::{aggregate, RunResult, RunStatus, RunSummary};
pub use classifier::{Classification, TaskClassifier};
pub use decomposer::{Decomposer, DEFAULT_SECS_PER_CHAR, MAX_ESTIMATE};
pub use metrics::{MetricsRecorder, MetricsSink, PerformanceStats, RunRecord, TracingSink};
pub use plan::{ExecutionPlan, PlanEntry, PlanStage};
pub use pool::RolePool;
pub use scheduler::{
    FailurePolicy, ScheduleOutcome, Scheduler, SchedulerEvent, SchedulerOptions,
    DEFAULT_TIMEOUT_SECS,
};
pub use selector::{RoleRecommendation, RoleSelector, DEFAULT_RECOMMENDATION_LIMIT};
pub use worker::{Invocation, SimulatedWorker, Worker, WorkerRegistry};
