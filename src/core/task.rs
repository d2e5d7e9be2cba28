//! Subtask data model for the execution DAG.
//!
//! Subtasks are the atomic units of work assigned to a role. They are
//! immutable once the decomposer creates them; execution outcomes live in
//! separate [`ExecutionRecord`]s so concurrent workers never share mutable
//! task state.

use crate::core::domain::{Complexity, Domain};
use crate::core::registry::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a subtask.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubTaskId(pub Uuid);

impl SubTaskId {
    /// Create a new unique subtask identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SubTaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubTaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubTaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of one analysed task (and the run that executes it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subtask status in its lifecycle.
///
/// `Pending -> Ready -> Running -> Completed | Failed`. Subtasks without
/// dependencies start in `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SubTaskStatus {
    /// Dependencies not yet satisfied.
    Pending,
    /// Dependencies satisfied, waiting for a role slot.
    Ready,
    /// Dispatched to a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully, or never ran.
    Failed {
        /// Why the subtask failed.
        error: String,
    },
}

impl SubTaskStatus {
    /// Initial status for a subtask with the given number of prerequisites.
    pub fn initial(dependency_count: usize) -> Self {
        if dependency_count == 0 {
            Self::Ready
        } else {
            Self::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubTaskStatus::Completed | SubTaskStatus::Failed { .. })
    }

    /// Whether a subtask in this status may still be dispatched.
    pub fn can_start(&self) -> bool {
        matches!(self, SubTaskStatus::Pending | SubTaskStatus::Ready)
    }
}

impl Default for SubTaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for SubTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubTaskStatus::Pending => write!(f, "pending"),
            SubTaskStatus::Ready => write!(f, "ready"),
            SubTaskStatus::Running => write!(f, "running"),
            SubTaskStatus::Completed => write!(f, "completed"),
            SubTaskStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// One role's contribution to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique identifier for this subtask.
    pub id: SubTaskId,
    /// What the role is asked to do.
    pub description: String,
    /// Role that executes this subtask.
    pub role: RoleId,
    /// Primary domain the subtask covers.
    pub domain: Domain,
    /// Subtasks that must finish before this one may run.
    pub dependencies: Vec<SubTaskId>,
    /// Priority tier; lower tiers run earlier.
    pub priority: u32,
    /// Estimated execution time.
    pub estimated_duration: Duration,
    /// Free-form parameters handed to the worker.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SubTask {
    /// Create a subtask with no dependencies, tier 0 and a zero estimate.
    pub fn new(role: impl Into<RoleId>, domain: Domain, description: &str) -> Self {
        Self {
            id: SubTaskId::new(),
            description: description.to_string(),
            role: role.into(),
            domain,
            dependencies: Vec::new(),
            priority: 0,
            estimated_duration: Duration::ZERO,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimate(mut self, estimate: Duration) -> Self {
        self.estimated_duration = estimate;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<SubTaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Outcome of a single subtask execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    Succeeded,
    Failed { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// What happened when a subtask ran (or was skipped).
///
/// Produced exactly once per subtask per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub subtask_id: SubTaskId,
    pub role: RoleId,
    pub outcome: Outcome,
    /// Worker output, or a short note for synthetic failures.
    pub output: String,
    /// Wall-clock time spent in the worker call.
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn succeeded(subtask: &SubTask, output: String, duration: Duration) -> Self {
        Self {
            subtask_id: subtask.id,
            role: subtask.role.clone(),
            outcome: Outcome::Succeeded,
            output,
            duration,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(subtask: &SubTask, reason: &str, duration: Duration) -> Self {
        Self {
            subtask_id: subtask.id,
            role: subtask.role.clone(),
            outcome: Outcome::Failed {
                reason: reason.to_string(),
            },
            output: String::new(),
            duration,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Terminal scheduler status equivalent to this record.
    pub fn status(&self) -> SubTaskStatus {
        match &self.outcome {
            Outcome::Succeeded => SubTaskStatus::Completed,
            Outcome::Failed { reason } => SubTaskStatus::Failed {
                error: reason.clone(),
            },
        }
    }
}

/// Everything known about a task before it runs.
///
/// Produced once by analysis and never mutated; a run reads it to build
/// its scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub id: AnalysisId,
    pub text: String,
    pub complexity: Complexity,
    pub domains: BTreeSet<Domain>,
    /// Roles selected for the task, sorted by id.
    pub required_roles: Vec<RoleId>,
    /// Subtasks in creation order.
    pub subtasks: Vec<SubTask>,
    /// Subtask id to prerequisite ids.
    pub dependencies: HashMap<SubTaskId, Vec<SubTaskId>>,
    /// Critical-path length of the dependency graph.
    pub estimated_duration: Duration,
    /// Confidence in the analysis, in `[0, 1]`.
    pub confidence: f64,
    /// Names of the patterns the text matched.
    #[serde(default)]
    pub matched_patterns: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskAnalysis {
    pub fn subtask(&self, id: &SubTaskId) -> Option<&SubTask> {
        self.subtasks.iter().find(|s| s.id == *id)
    }

    /// Sum of all subtask estimates, i.e. the fully serial run time.
    pub fn serial_duration(&self) -> Duration {
        self.subtasks.iter().map(|s| s.estimated_duration).sum()
    }
}
