//! Per-role capacity gate.
//!
//! The `RolePool` tracks in-flight subtasks per role and enforces each
//! role's parallel capacity from the capability registry. Ready subtasks
//! that cannot start yet wait in a per-role queue ordered by priority tier,
//! then creation order. Exhausted capacity is a queuing condition, never an
//! error.

use crate::core::{CapabilityRegistry, RoleId, SubTaskId};
use std::collections::{BTreeMap, HashMap};

/// Queue position: priority tier first, then creation sequence.
type QueueKey = (u32, usize);

/// Capacity counters and wait queues for every role in a run.
#[derive(Debug, Default)]
pub struct RolePool {
    /// Maximum concurrent subtasks per role.
    capacities: HashMap<RoleId, usize>,
    /// Subtasks currently running per role.
    in_flight: HashMap<RoleId, usize>,
    /// Ready subtasks waiting for a slot.
    queues: HashMap<RoleId, BTreeMap<QueueKey, SubTaskId>>,
}

impl RolePool {
    /// Create a pool using the capacities declared in `registry`.
    pub fn new(registry: &CapabilityRegistry) -> Self {
        Self {
            capacities: registry
                .iter()
                .map(|(role, entry)| (role.clone(), entry.parallel_capacity.max(1)))
                .collect(),
            in_flight: HashMap::new(),
            queues: HashMap::new(),
        }
    }

    /// Capacity for a role. Roles missing from the registry get one slot.
    pub fn capacity(&self, role: &RoleId) -> usize {
        self.capacities.get(role).copied().unwrap_or(1)
    }

    pub fn in_flight(&self, role: &RoleId) -> usize {
        self.in_flight.get(role).copied().unwrap_or(0)
    }

    pub fn has_capacity(&self, role: &RoleId) -> bool {
        self.in_flight(role) < self.capacity(role)
    }

    /// Total running subtasks across roles.
    pub fn active_count(&self) -> usize {
        self.in_flight.values().sum()
    }

    /// Total subtasks waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.queues.values().map(BTreeMap::len).sum()
    }

    /// Queue a ready subtask for its role.
    pub fn enqueue(&mut self, role: &RoleId, priority: u32, sequence: usize, id: SubTaskId) {
        self.queues
            .entry(role.clone())
            .or_default()
            .insert((priority, sequence), id);
    }

    /// Pop every queued subtask that can start now and claim its slot.
    ///
    /// Subtasks are returned in global (priority, creation) order.
    pub fn take_dispatchable(&mut self) -> Vec<(RoleId, SubTaskId)> {
        let mut dispatched = Vec::new();

        loop {
            let next = self
                .queues
                .iter()
                .filter(|(role, _)| self.has_capacity(role))
                .filter_map(|(role, queue)| queue.keys().next().map(|key| (*key, role.clone())))
                .min();

            let Some((key, role)) = next else {
                break;
            };

            if let Some(id) = self.queues.get_mut(&role).and_then(|q| q.remove(&key)) {
                *self.in_flight.entry(role.clone()).or_insert(0) += 1;
                dispatched.push((role, id));
            }
        }

        self.queues.retain(|_, queue| !queue.is_empty());
        dispatched
    }

    /// Free a slot after a subtask finishes.
    pub fn release(&mut self, role: &RoleId) {
        if let Some(count) = self.in_flight.get_mut(role) {
            *count = count.saturating_sub(1);
        }
    }

    /// Remove and return every queued subtask (used on cancellation).
    pub fn drain_queued(&mut self) -> Vec<SubTaskId> {
        let mut drained: Vec<(QueueKey, SubTaskId)> = self
            .queues
            .drain()
            .flat_map(|(_, queue)| queue.into_iter())
            .collect();
        drained.sort();
        drained.into_iter().map(|(_, id)| id).collect()
    }
}
