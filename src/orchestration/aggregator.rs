//! Result aggregation for a finished run.

use crate::core::{AnalysisId, ExecutionRecord, RoleId, SubTaskId, SubTaskStatus, TaskAnalysis};
use crate::orchestration::scheduler::ScheduleOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every subtask succeeded.
    Completed,
    /// At least one subtask failed.
    PartiallyFailed,
    /// The caller cancelled the run; results are partial.
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::PartiallyFailed => write!(f, "partially failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_subtasks: usize,
    /// Distinct roles that had a subtask in the run.
    pub roles_involved: Vec<RoleId>,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
}

/// Combined result of executing one analysed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub analysis_id: AnalysisId,
    pub status: RunStatus,
    /// One record per subtask, in creation order.
    pub records: Vec<ExecutionRecord>,
    pub statuses: BTreeMap<SubTaskId, SubTaskStatus>,
    /// Subtask ids grouped by the role that ran them.
    pub by_role: BTreeMap<RoleId, Vec<SubTaskId>>,
    /// Successful outputs joined under role headings.
    pub combined_output: String,
    pub summary: RunSummary,
    pub elapsed: Duration,
    /// Critical-path estimate from the analysis.
    pub estimated: Duration,
    pub confidence: f64,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.summary.all_succeeded && self.status != RunStatus::Cancelled
    }

    pub fn record(&self, id: &SubTaskId) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.subtask_id == *id)
    }

    /// Records belonging to one role.
    pub fn records_for<'a>(&'a self, role: &'a RoleId) -> impl Iterator<Item = &'a ExecutionRecord> {
        self.records.iter().filter(move |r| &r.role == role)
    }
}

/// Merges the scheduler's outcome into a [`RunResult`].
pub fn aggregate(analysis: &TaskAnalysis, outcome: ScheduleOutcome) -> RunResult {
    let ScheduleOutcome {
        records,
        statuses,
        cancelled,
        elapsed,
    } = outcome;

    let mut by_role: BTreeMap<RoleId, Vec<SubTaskId>> = BTreeMap::new();
    for record in &records {
        by_role
            .entry(record.role.clone())
            .or_default()
            .push(record.subtask_id);
    }

    let succeeded = records.iter().filter(|r| r.is_success()).count();
    let failed = records.len() - succeeded;

    let combined_output = records
        .iter()
        .filter(|r| r.is_success())
        .map(|r| format!("## {}\n{}", r.role, r.output))
        .collect::<Vec<_>>()
        .join("\n\n");

    let status = if cancelled {
        RunStatus::Cancelled
    } else if failed > 0 {
        RunStatus::PartiallyFailed
    } else {
        RunStatus::Completed
    };

    let summary = RunSummary {
        total_subtasks: records.len(),
        roles_involved: by_role.keys().cloned().collect(),
        succeeded,
        failed,
        all_succeeded: failed == 0,
    };

    info!(
        analysis = %analysis.id.short(),
        %status,
        succeeded,
        failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "run aggregated"
    );

    RunResult {
        analysis_id: analysis.id,
        status,
        records,
        statuses: statuses.into_iter().collect(),
        by_role,
        combined_output,
        summary,
        elapsed,
        estimated: analysis.estimated_duration,
        confidence: analysis.confidence,
    }
}
