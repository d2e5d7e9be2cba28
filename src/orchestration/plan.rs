//! Read-only execution plan for presentation.

use crate::core::{AnalysisId, Complexity, RoleId, SubTaskId, TaskAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub id: SubTaskId,
    pub role: RoleId,
    pub description: String,
    pub estimated_duration: Duration,
    pub dependencies: Vec<SubTaskId>,
}

/// Subtasks sharing one priority tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStage {
    pub priority: u32,
    /// True when the stage holds more than one subtask.
    pub parallel: bool,
    pub subtasks: Vec<PlanEntry>,
}

/// Stages in ascending priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub analysis_id: AnalysisId,
    pub complexity: Complexity,
    pub estimated_duration: Duration,
    pub confidence: f64,
    pub stages: Vec<PlanStage>,
}

impl ExecutionPlan {
    /// Group the analysis subtasks by tier. Entries keep creation order.
    pub fn from_analysis(analysis: &TaskAnalysis) -> Self {
        let mut tiers: BTreeMap<u32, Vec<PlanEntry>> = BTreeMap::new();
        for subtask in &analysis.subtasks {
            let dependencies = analysis
                .dependencies
                .get(&subtask.id)
                .cloned()
                .unwrap_or_default();
            tiers.entry(subtask.priority).or_default().push(PlanEntry {
                id: subtask.id,
                role: subtask.role.clone(),
                description: subtask.description.clone(),
                estimated_duration: subtask.estimated_duration,
                dependencies,
            });
        }

        let stages = tiers
            .into_iter()
            .map(|(priority, subtasks)| PlanStage {
                priority,
                parallel: subtasks.len() > 1,
                subtasks,
            })
            .collect();

        Self {
            analysis_id: analysis.id,
            complexity: analysis.complexity,
            estimated_duration: analysis.estimated_duration,
            confidence: analysis.confidence,
            stages,
        }
    }

    pub fn subtask_count(&self) -> usize {
        self.stages.iter().map(|s| s.subtasks.len()).sum()
    }
}
