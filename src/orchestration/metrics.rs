//! Per-role performance statistics and run history.
//!
//! The recorder is updated once per finished (or cancelled) run. Success
//! rates use an online mean so updates stay O(1) regardless of history
//! length.

use crate::core::{AnalysisId, Complexity, Domain, ExecutionRecord, RoleId, TaskAnalysis};
use crate::orchestration::aggregator::{RunResult, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

/// Rolling counters for one role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Runs the role took part in.
    pub task_count: u64,
    /// Accumulated share of run wall-clock time.
    pub busy_time: Duration,
    /// Fraction of runs in which all of the role's subtasks succeeded.
    pub success_rate: f64,
}

impl PerformanceStats {
    /// Fold one observation into the stats.
    pub fn record(&mut self, succeeded: bool, busy: Duration) {
        self.task_count += 1;
        self.busy_time += busy;

        let n = self.task_count as f64;
        let outcome = if succeeded { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * (n - 1.0) + outcome) / n;
    }

    /// Average busy time per run.
    pub fn mean_busy_time(&self) -> Duration {
        match u32::try_from(self.task_count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.busy_time / n,
        }
    }
}

/// Summary of one run, kept in history and handed to the metrics sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub analysis_id: AnalysisId,
    pub timestamp: DateTime<Utc>,
    pub complexity: Complexity,
    pub domains: BTreeSet<Domain>,
    pub roles: Vec<RoleId>,
    pub elapsed: Duration,
    pub estimated: Duration,
    /// `elapsed / estimated`, or 1.0 when nothing was estimated.
    pub accuracy: f64,
    pub confidence: f64,
    pub success: bool,
    pub cancelled: bool,
}

impl RunRecord {
    pub fn from_run(analysis: &TaskAnalysis, result: &RunResult) -> Self {
        let estimated = result.estimated.as_secs_f64();
        let accuracy = if estimated > 0.0 {
            result.elapsed.as_secs_f64() / estimated
        } else {
            1.0
        };

        Self {
            analysis_id: analysis.id,
            timestamp: Utc::now(),
            complexity: analysis.complexity,
            domains: analysis.domains.clone(),
            roles: result.summary.roles_involved.clone(),
            elapsed: result.elapsed,
            estimated: result.estimated,
            accuracy,
            confidence: result.confidence,
            success: result.summary.all_succeeded,
            cancelled: result.status == RunStatus::Cancelled,
        }
    }
}

/// External consumer of run summaries. Called exactly once per run.
pub trait MetricsSink: Send + Sync {
    fn record_run(&self, record: &RunRecord);
}

/// Sink that writes each run summary to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record_run(&self, record: &RunRecord) {
        info!(
            analysis = %record.analysis_id.short(),
            complexity = %record.complexity,
            roles = record.roles.len(),
            elapsed_ms = record.elapsed.as_millis() as u64,
            accuracy = record.accuracy,
            success = record.success,
            cancelled = record.cancelled,
            "run recorded"
        );
    }
}

/// Owns role statistics, run history and the append-only execution log.
#[derive(Debug, Default, Clone)]
pub struct MetricsRecorder {
    stats: BTreeMap<RoleId, PerformanceStats>,
    history: Vec<RunRecord>,
    execution_log: Vec<ExecutionRecord>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats for every role that had a subtask in `result`, then
    /// append the run to history and its records to the execution log.
    pub fn record_run(&mut self, result: &RunResult, record: RunRecord) {
        let roles = &result.summary.roles_involved;
        let share = match u32::try_from(roles.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => result.elapsed / n,
        };

        for role in roles {
            let succeeded = result.records_for(role).all(ExecutionRecord::is_success);
            let stats = self.stats.entry(role.clone()).or_default();
            stats.record(succeeded, share);
            debug!(
                %role,
                task_count = stats.task_count,
                success_rate = stats.success_rate,
                "role stats updated"
            );
        }

        self.execution_log.extend(result.records.iter().cloned());
        self.history.push(record);
    }

    pub fn stats(&self) -> &BTreeMap<RoleId, PerformanceStats> {
        &self.stats
    }

    pub fn stats_for(&self, role: &RoleId) -> Option<&PerformanceStats> {
        self.stats.get(role)
    }

    /// Mean success rate over the given roles that have stats.
    pub fn mean_success_rate<'a>(&self, roles: impl IntoIterator<Item = &'a RoleId>) -> Option<f64> {
        let rates: Vec<f64> = roles
            .into_iter()
            .filter_map(|role| self.stats.get(role))
            .map(|stats| stats.success_rate)
            .collect();
        if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        }
    }

    pub fn history(&self) -> &[RunRecord] {
        &self.history
    }

    pub fn execution_log(&self) -> &[ExecutionRecord] {
        &self.execution_log
    }
}
