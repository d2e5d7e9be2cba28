//! Decomposition of a task into role subtasks wired by priority tier.

use crate::core::{Catalog, Domain, RoleId, SubTask, SubTaskId};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

/// Default estimate base rate: seconds of work per character of task text.
pub const DEFAULT_SECS_PER_CHAR: f64 = 0.01;

/// Upper bound on a single subtask estimate (one year).
pub const MAX_ESTIMATE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Expands selected roles into subtasks with tiered dependencies.
pub struct Decomposer<'a> {
    catalog: &'a Catalog,
    secs_per_char: f64,
}

impl<'a> Decomposer<'a> {
    pub fn new(catalog: &'a Catalog, secs_per_char: f64) -> Self {
        Self {
            catalog,
            secs_per_char,
        }
    }

    /// Produce subtasks in creation order plus the matching dependency map.
    ///
    /// Roles whose domains do not intersect the task domains contribute no
    /// subtask. Every subtask at tier N depends on all subtasks at the
    /// nearest lower tier that has members, so subtasks within a tier can
    /// run in parallel.
    pub fn decompose(
        &self,
        text: &str,
        roles: &BTreeSet<RoleId>,
        domains: &BTreeSet<Domain>,
    ) -> (Vec<SubTask>, HashMap<SubTaskId, Vec<SubTaskId>>) {
        let drafts: Vec<SubTask> = roles
            .iter()
            .filter_map(|role| self.draft(text, role, domains))
            .collect();

        // Members of each occupied tier, in ascending tier order.
        let tiers: BTreeSet<u32> = drafts.iter().map(|s| s.priority).collect();
        let members = |tier: u32| -> Vec<SubTaskId> {
            drafts
                .iter()
                .filter(|s| s.priority == tier)
                .map(|s| s.id)
                .collect()
        };

        let mut dependencies = HashMap::with_capacity(drafts.len());
        let mut subtasks = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            let previous = tiers.range(..draft.priority).next_back().copied();
            let deps = previous.map(members).unwrap_or_default();
            dependencies.insert(draft.id, deps.clone());
            subtasks.push(draft.clone().with_dependencies(deps));
        }

        debug!(
            subtasks = subtasks.len(),
            tiers = ?tiers,
            "decomposed task"
        );
        (subtasks, dependencies)
    }

    fn draft(&self, text: &str, role: &RoleId, domains: &BTreeSet<Domain>) -> Option<SubTask> {
        let entry = self.catalog.roles.get(role)?;
        let covered: Vec<Domain> = entry.domains.intersection(domains).copied().collect();
        let primary = *covered.first()?;

        let description = match &entry.template {
            Some(template) => template.replace("{task}", text),
            None => {
                let names: Vec<&str> = covered.iter().map(|d| d.as_str()).collect();
                format!("{} handles {} aspects of: {}", role, names.join(", "), text)
            }
        };

        Some(
            SubTask::new(role.clone(), primary, &description)
                .with_priority(entry.category.priority_tier())
                .with_estimate(self.estimate(text, entry.multiplier))
                .with_metadata("domains", serde_json::json!(covered)),
        )
    }

    /// `len(text) * secs_per_char * multiplier`.
    pub fn estimate(&self, text: &str, multiplier: f64) -> Duration {
        let secs = text.chars().count() as f64 * self.secs_per_char * multiplier;
        Duration::try_from_secs_f64(secs).map_or(MAX_ESTIMATE, |d| d.min(MAX_ESTIMATE))
    }
}
