//! The orchestration engine: analysis, planning, execution and metrics.
//!
//! An [`Engine`] owns its catalog and configuration; nothing is global, so
//! independent engines can coexist with different catalogs. All methods
//! take `&self` and may be called concurrently for independent tasks.

use crate::config::Config;
use crate::core::{
    AnalysisId, Catalog, DependencyGraph, ExecutionRecord, RoleId, TaskAnalysis,
};
use crate::orchestration::{
    aggregate, Classification, Decomposer, ExecutionPlan, MetricsRecorder, MetricsSink,
    PerformanceStats, RoleRecommendation, RoleSelector, RunRecord, RunResult, Scheduler,
    SchedulerEvent, TaskClassifier, TracingSink, WorkerRegistry,
};
use crate::Result;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tasks shorter than this many characters lower confidence.
const SHORT_TASK_CHARS: usize = 20;

#[derive(Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    config: Config,
    workers: WorkerRegistry,
    metrics: Arc<RwLock<MetricsRecorder>>,
    sink: Arc<dyn MetricsSink>,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl Engine {
    /// Create an engine after validating `catalog` and `config`.
    pub fn new(catalog: Catalog, config: Config) -> Result<Self> {
        catalog.validate()?;
        config.validate()?;
        Ok(Self::assemble(catalog, config))
    }

    /// Create an engine from a config, loading its catalog.
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = config.load_catalog()?;
        Self::new(catalog, config)
    }

    fn assemble(catalog: Catalog, config: Config) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config,
            workers: WorkerRegistry::new(),
            metrics: Arc::new(RwLock::new(MetricsRecorder::new())),
            sink: Arc::new(TracingSink),
            events: None,
        }
    }

    pub fn with_workers(mut self, workers: WorkerRegistry) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Forward scheduler events of every run to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classify, select roles, decompose and estimate a task.
    ///
    /// # Errors
    /// Only structural errors in the generated dependency graph, which the
    /// tiered wiring rules out for a valid catalog.
    pub async fn analyze_task(&self, text: &str) -> Result<TaskAnalysis> {
        let classification = TaskClassifier::new(&self.catalog).classify(text);
        let roles = RoleSelector::new(&self.catalog).select(text, &classification);
        let (subtasks, dependencies) = Decomposer::new(&self.catalog, self.config.secs_per_char)
            .decompose(text, &roles, &classification.domains);

        let graph = DependencyGraph::build(&subtasks, &dependencies)?;
        let estimated_duration = graph.critical_path()?;

        let mean_success = self.metrics.read().await.mean_success_rate(&roles);
        let confidence = confidence(text, &classification, &roles, mean_success);

        let analysis = TaskAnalysis {
            id: AnalysisId::new(),
            text: text.to_string(),
            complexity: classification.complexity,
            domains: classification.domains,
            required_roles: roles.into_iter().collect(),
            subtasks,
            dependencies,
            estimated_duration,
            confidence,
            matched_patterns: classification.matched_patterns,
            created_at: Utc::now(),
        };

        info!(
            analysis = %analysis.id.short(),
            complexity = %analysis.complexity,
            domains = ?analysis.domains,
            roles = analysis.required_roles.len(),
            subtasks = analysis.subtasks.len(),
            estimated_ms = analysis.estimated_duration.as_millis() as u64,
            confidence,
            "task analyzed"
        );
        Ok(analysis)
    }

    /// Execute an analysed task to completion.
    pub async fn execute_task(&self, analysis: &TaskAnalysis) -> Result<RunResult> {
        self.execute_task_with_cancel(analysis, CancellationToken::new())
            .await
    }

    /// Execute an analysed task; cancelling `cancel` ends the run early
    /// with a partial result.
    ///
    /// # Errors
    /// Only structural errors ([`Error::UnknownSubtask`](crate::Error::UnknownSubtask),
    /// [`Error::CycleDetected`](crate::Error::CycleDetected)); nothing runs
    /// and no metrics are recorded. Worker failures, timeouts and
    /// cancellation are reported inside the [`RunResult`].
    pub async fn execute_task_with_cancel(
        &self,
        analysis: &TaskAnalysis,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let mut scheduler = Scheduler::new(
            &analysis.subtasks,
            &analysis.dependencies,
            &self.catalog.roles,
            self.workers.clone(),
            self.config.scheduler_options(),
        )?;
        if let Some(tx) = &self.events {
            scheduler = scheduler.with_events(tx.clone());
        }

        info!(analysis = %analysis.id.short(), subtasks = analysis.subtasks.len(), "executing task");
        let outcome = scheduler.run(cancel).await;
        let result = aggregate(analysis, outcome);

        let record = RunRecord::from_run(analysis, &result);
        self.metrics
            .write()
            .await
            .record_run(&result, record.clone());
        self.sink.record_run(&record);

        Ok(result)
    }

    /// Subtasks grouped into priority stages. No side effects.
    pub fn get_execution_plan(&self, analysis: &TaskAnalysis) -> ExecutionPlan {
        ExecutionPlan::from_analysis(analysis)
    }

    /// Roles scored against `text`, best first.
    pub fn recommend_roles(&self, text: &str, limit: usize) -> Vec<RoleRecommendation> {
        let classification = TaskClassifier::new(&self.catalog).classify(text);
        RoleSelector::new(&self.catalog).recommend(text, &classification, limit)
    }

    /// Snapshot of per-role statistics.
    pub async fn performance_stats(&self) -> BTreeMap<RoleId, PerformanceStats> {
        self.metrics.read().await.stats().clone()
    }

    pub async fn run_history(&self) -> Vec<RunRecord> {
        self.metrics.read().await.history().to_vec()
    }

    pub async fn execution_log(&self) -> Vec<ExecutionRecord> {
        self.metrics.read().await.execution_log().to_vec()
    }
}

impl Default for Engine {
    /// Built-in catalog and default configuration, with no workers.
    fn default() -> Self {
        Self::assemble(Catalog::default(), Config::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("roles", &self.catalog.roles.len())
            .field("config", &self.config)
            .field("workers", &self.workers)
            .finish()
    }
}

/// Confidence in an analysis, in `[0, 1]`.
fn confidence(
    text: &str,
    classification: &Classification,
    roles: &BTreeSet<RoleId>,
    mean_success: Option<f64>,
) -> f64 {
    let mut score = 1.0;
    if text.chars().count() < SHORT_TASK_CHARS {
        score *= 0.8;
    }
    if classification.domains.len() > 3 {
        score *= 0.9;
    }
    if roles.len() > 5 {
        score *= 0.85;
    }
    if !classification.is_ambiguous() {
        score *= 1.1;
    }
    if let Some(rate) = mean_success {
        score *= 0.75 + 0.25 * rate;
    }
    score.clamp(0.0, 1.0)
}
