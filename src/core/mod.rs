//! Core domain models for the orchestration engine.
//!
//! This module contains the fundamental data structures used throughout
//! the engine: domains and complexity tiers, the capability catalog,
//! subtasks with their execution records, and the dependency DAG.

pub mod dag;
pub mod domain;
pub mod registry;
pub mod task;

pub use dag::DependencyGraph;
pub use domain::{Complexity, Domain};
pub use registry::{
    CapabilityEntry, CapabilityRegistry, Catalog, PatternTable, RoleCategory, RoleId, TaskPattern,
};
pub use task::{
    AnalysisId, ExecutionRecord, Outcome, SubTask, SubTaskId, SubTaskStatus, TaskAnalysis,
};
