//! Subtask dependency graph.
//!
//! This module provides the DependencyGraph that represents subtask
//! dependencies as a directed acyclic graph. It validates the structure
//! once, up front, and then answers the questions the scheduler and the
//! estimator need: topological order, direct dependents, and the critical
//! path.

use crate::core::task::{SubTask, SubTaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::time::Duration;

/// The subtask dependency graph.
///
/// Nodes hold subtask ids and their estimated duration; an edge
/// `a -> b` means `a` must complete before `b` starts.
pub struct DependencyGraph {
    /// The underlying directed graph.
    graph: DiGraph<SubTaskId, ()>,
    /// Index mapping from SubTaskId to NodeIndex for fast lookups.
    index: HashMap<SubTaskId, NodeIndex>,
    /// Node weights for critical-path computation.
    durations: HashMap<SubTaskId, Duration>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            durations: HashMap::new(),
        }
    }

    /// Build a graph from subtasks and a dependency map.
    ///
    /// Every key and every prerequisite in `dependencies` must name one of
    /// `subtasks`; subtasks missing from the map have no prerequisites.
    ///
    /// # Errors
    /// Returns [`Error::UnknownSubtask`] for a dangling reference and
    /// [`Error::CycleDetected`] when the edges do not form a DAG.
    pub fn build(
        subtasks: &[SubTask],
        dependencies: &HashMap<SubTaskId, Vec<SubTaskId>>,
    ) -> Result<Self> {
        let mut dag = Self::new();
        for subtask in subtasks {
            dag.add_subtask(subtask.id, subtask.estimated_duration);
        }

        for subtask in subtasks {
            for prerequisite in dependencies.get(&subtask.id).into_iter().flatten() {
                dag.add_dependency(prerequisite, &subtask.id)?;
            }
        }

        if let Some(id) = dependencies.keys().find(|id| !dag.contains(id)) {
            return Err(Error::UnknownSubtask { id: *id });
        }

        Ok(dag)
    }

    /// Build a graph from the dependency lists carried by the subtasks.
    pub fn from_subtasks(subtasks: &[SubTask]) -> Result<Self> {
        let dependencies = subtasks
            .iter()
            .map(|s| (s.id, s.dependencies.clone()))
            .collect();
        Self::build(subtasks, &dependencies)
    }

    /// Add a node. Adding an existing id returns its existing index.
    pub fn add_subtask(&mut self, id: SubTaskId, duration: Duration) -> NodeIndex {
        if let Some(&index) = self.index.get(&id) {
            return index;
        }

        let index = self.graph.add_node(id);
        self.index.insert(id, index);
        self.durations.insert(id, duration);
        index
    }

    /// Add an edge: `from` must complete before `to` can start.
    ///
    /// # Errors
    /// Returns an error if either subtask is unknown or the edge would
    /// close a cycle. The graph is left unchanged on error.
    pub fn add_dependency(&mut self, from: &SubTaskId, to: &SubTaskId) -> Result<()> {
        let from_index = *self
            .index
            .get(from)
            .ok_or(Error::UnknownSubtask { id: *from })?;
        let to_index = *self.index.get(to).ok_or(Error::UnknownSubtask { id: *to })?;

        if self.graph.find_edge(from_index, to_index).is_some() {
            return Ok(());
        }

        let edge = self.graph.add_edge(from_index, to_index, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::CycleDetected(format!(
                "adding {} -> {} closes a cycle",
                from.short(),
                to.short()
            )));
        }

        Ok(())
    }

    pub fn contains(&self, id: &SubTaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn has_dependency(&self, from: &SubTaskId, to: &SubTaskId) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&f), Some(&t)) => self.graph.find_edge(f, t).is_some(),
            _ => false,
        }
    }

    /// Direct prerequisites of `id`.
    pub fn dependencies_of(&self, id: &SubTaskId) -> Vec<SubTaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Subtasks that list `id` as a direct prerequisite.
    pub fn dependents_of(&self, id: &SubTaskId) -> Vec<SubTaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &SubTaskId, direction: Direction) -> Vec<SubTaskId> {
        match self.index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, direction)
                .filter_map(|n| self.graph.node_weight(n).copied())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Subtask ids in an order where every subtask follows its prerequisites.
    ///
    /// # Errors
    /// Returns [`Error::CycleDetected`] if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<SubTaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let at = self
                .graph
                .node_weight(cycle.node_id())
                .map(|id| id.short())
                .unwrap_or_else(|| "unknown".to_string());
            Error::CycleDetected(format!("cycle through subtask {}", at))
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index).copied())
            .collect())
    }

    /// Longest duration-weighted path through the graph.
    ///
    /// This is the lower bound on total run time under unlimited
    /// concurrency. Parallel branches do not add up; only the heaviest
    /// chain counts.
    pub fn critical_path(&self) -> Result<Duration> {
        let order = self.topological_order()?;
        let mut finish: HashMap<SubTaskId, Duration> = HashMap::with_capacity(order.len());
        let mut longest = Duration::ZERO;

        for id in order {
            let start = self
                .dependencies_of(&id)
                .iter()
                .filter_map(|dep| finish.get(dep))
                .max()
                .copied()
                .unwrap_or(Duration::ZERO);
            let end = start + self.durations.get(&id).copied().unwrap_or(Duration::ZERO);
            longest = longest.max(end);
            finish.insert(id, end);
        }

        Ok(longest)
    }

    /// Sum of all node durations, i.e. the fully serial run time.
    pub fn total_duration(&self) -> Duration {
        self.durations.values().sum()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("subtasks", &self.node_count())
            .field("dependencies", &self.edge_count())
            .finish()
    }
}
