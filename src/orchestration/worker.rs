//! Worker capability interface.
//!
//! A worker performs one role's domain work. The engine treats it as an
//! opaque, possibly slow, possibly failing call: it hands over an
//! [`Invocation`] and gets back output or an error. Timeouts and
//! cancellation are enforced by the scheduler around the call.

use crate::core::{RoleId, SubTask, SubTaskId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Everything a worker needs to perform one subtask.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub role: RoleId,
    pub subtask_id: SubTaskId,
    pub description: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Upper bound the scheduler will wait for this call.
    pub timeout: Duration,
    /// Decomposer's estimate, for workers that want to pace themselves.
    pub estimated_duration: Duration,
}

impl Invocation {
    pub fn for_subtask(subtask: &SubTask, timeout: Duration) -> Self {
        Self {
            role: subtask.role.clone(),
            subtask_id: subtask.id,
            description: subtask.description.clone(),
            parameters: subtask.metadata.clone(),
            timeout,
            estimated_duration: subtask.estimated_duration,
        }
    }
}

/// The external capability that executes a role's subtasks.
///
/// Returning `Err` marks the subtask `Failed`; it never aborts the run.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn invoke(&self, invocation: Invocation) -> Result<String>;
}

/// Maps role ids to worker implementations.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<RoleId, Arc<dyn Worker>>,
    fallback: Option<Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that sends every role to the same worker.
    pub fn with_fallback(worker: Arc<dyn Worker>) -> Self {
        Self {
            workers: HashMap::new(),
            fallback: Some(worker),
        }
    }

    pub fn register(&mut self, role: impl Into<RoleId>, worker: Arc<dyn Worker>) {
        self.workers.insert(role.into(), worker);
    }

    pub fn set_fallback(&mut self, worker: Arc<dyn Worker>) {
        self.fallback = Some(worker);
    }

    /// Worker for `role`, or the fallback.
    pub fn resolve(&self, role: &RoleId) -> Option<Arc<dyn Worker>> {
        self.workers
            .get(role)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<&str> = self.workers.keys().map(|r| r.as_str()).collect();
        roles.sort_unstable();
        f.debug_struct("WorkerRegistry")
            .field("roles", &roles)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Worker that sleeps for a scaled estimate and reports success.
///
/// Used by the CLI to demonstrate scheduling without a real backend.
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    /// Multiplier applied to the estimate; `0.0` completes immediately.
    speed: f64,
}

impl SimulatedWorker {
    pub fn new(speed: f64) -> Self {
        Self {
            speed: speed.max(0.0),
        }
    }
}

impl Default for SimulatedWorker {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Worker for SimulatedWorker {
    async fn invoke(&self, invocation: Invocation) -> Result<String> {
        let secs = invocation.estimated_duration.as_secs_f64() * self.speed;
        let pause = Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::Worker(format!("invalid simulated duration: {}", e)))?;
        if pause > invocation.timeout {
            return Err(Error::Timeout(invocation.timeout));
        }
        tokio::time::sleep(pause).await;
        Ok(format!("Completed: {}", invocation.description))
    }
}
