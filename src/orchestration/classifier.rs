//! Task classification: text to domains and a complexity tier.

use crate::core::{Catalog, Complexity, Domain, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Highest tier a pattern match alone can impose. Anything above comes from
/// domain cardinality or explicit keywords.
const PATTERN_FLOOR_CAP: Complexity = Complexity::Moderate;

/// What the classifier learned about a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Never empty; falls back to [`Domain::FullStack`].
    pub domains: BTreeSet<Domain>,
    pub complexity: Complexity,
    /// Names of the patterns that matched, in table order.
    pub matched_patterns: Vec<String>,
    /// Roles implied directly by the matched patterns.
    pub implied_roles: BTreeSet<RoleId>,
}

impl Classification {
    /// True when no pattern matched and the defaults were used.
    pub fn is_ambiguous(&self) -> bool {
        self.matched_patterns.is_empty()
    }
}

/// Maps task text to domains and complexity using a [`Catalog`].
pub struct TaskClassifier<'a> {
    catalog: &'a Catalog,
}

impl<'a> TaskClassifier<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        let patterns = &self.catalog.patterns;

        let mut matched_patterns = Vec::new();
        let mut implied_roles = BTreeSet::new();
        let mut domains = BTreeSet::new();
        let mut floor = Complexity::Simple;

        for pattern in patterns.matching(&lowered) {
            matched_patterns.push(pattern.name.clone());
            floor = floor.max(pattern.complexity.min(PATTERN_FLOOR_CAP));
            for role in &pattern.roles {
                if let Some(entry) = self.catalog.roles.get(role) {
                    domains.extend(entry.domains.iter().copied());
                }
                implied_roles.insert(role.clone());
            }
        }

        if domains.is_empty() {
            warn!(task = text, "no pattern matched, defaulting to full_stack (low confidence)");
            domains.insert(Domain::FullStack);
        }

        // Explicit keywords always beat the cardinality-derived default.
        let complexity = if contains_any(&lowered, &patterns.expert_keywords) {
            Complexity::Expert
        } else if contains_any(&lowered, &patterns.complex_keywords) {
            Complexity::Complex
        } else {
            Complexity::from_domain_count(domains.len()).max(floor)
        };

        debug!(
            domains = ?domains,
            %complexity,
            patterns = ?matched_patterns,
            "classified task"
        );

        Classification {
            domains,
            complexity,
            matched_patterns,
            implied_roles,
        }
    }
}

pub(crate) fn contains_any(lowered: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
}
