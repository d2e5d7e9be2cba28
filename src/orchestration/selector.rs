//! Role selection and role recommendations.

use crate::core::{Catalog, RoleId};
use crate::orchestration::classifier::{contains_any, Classification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Default number of recommendations returned.
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;

/// A scored suggestion of a role for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecommendation {
    pub role: RoleId,
    pub score: u32,
    pub reasons: Vec<String>,
    /// `min(score / 10, 1)`.
    pub confidence: f64,
}

/// Chooses the roles engaged for a classified task.
pub struct RoleSelector<'a> {
    catalog: &'a Catalog,
}

impl<'a> RoleSelector<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Select roles by additive rules.
    ///
    /// 1. Roles implied by matched patterns.
    /// 2. Roles covering a task domain whose ceiling admits the complexity.
    /// 3. The review role for Complex and Expert tasks.
    /// 4. The security role when the text is security-sensitive.
    pub fn select(&self, text: &str, classification: &Classification) -> BTreeSet<RoleId> {
        let lowered = text.to_lowercase();
        let patterns = &self.catalog.patterns;
        let complexity = classification.complexity;

        let mut selected: BTreeSet<RoleId> = classification.implied_roles.clone();

        for &domain in &classification.domains {
            for (role, entry) in self.catalog.roles.covering(domain) {
                if entry.handles(complexity) {
                    selected.insert(role.clone());
                } else {
                    debug!(%role, %domain, %complexity, "role excluded by complexity ceiling");
                }
            }
        }

        if complexity.requires_review() {
            selected.insert(patterns.review_role.clone());
        }

        if contains_any(&lowered, &patterns.sensitive_keywords) {
            selected.insert(patterns.security_role.clone());
        }

        if selected.is_empty() {
            // Only reachable with a catalog whose full-stack roles cannot take
            // this complexity; engage them anyway rather than return nothing.
            warn!(%complexity, "no role qualified, falling back to domain coverage");
            for &domain in &classification.domains {
                selected.extend(self.catalog.roles.covering(domain).map(|(r, _)| r.clone()));
            }
        }

        debug!(roles = ?selected, "selected roles");
        selected
    }

    /// Score every role against the task text.
    ///
    /// Each skill tag found in the text scores 2 (hyphens read as spaces);
    /// each classified domain the role covers scores 3.
    pub fn recommend(
        &self,
        text: &str,
        classification: &Classification,
        limit: usize,
    ) -> Vec<RoleRecommendation> {
        let lowered = text.to_lowercase();

        let mut recommendations: Vec<RoleRecommendation> = self
            .catalog
            .roles
            .iter()
            .filter_map(|(role, entry)| {
                let mut score = 0;
                let mut reasons = Vec::new();

                for skill in &entry.skills {
                    if lowered.contains(&skill.replace('-', " ")) {
                        score += 2;
                        reasons.push(format!("Expertise in {}", skill));
                    }
                }

                for domain in &classification.domains {
                    if entry.covers(*domain) {
                        score += 3;
                        reasons.push(format!("Specializes in {}", domain));
                    }
                }

                (score > 0).then(|| RoleRecommendation {
                    role: role.clone(),
                    score,
                    reasons,
                    confidence: (f64::from(score) / 10.0).min(1.0),
                })
            })
            .collect();

        recommendations.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.role.cmp(&b.role)));
        recommendations.truncate(limit);
        recommendations
    }
}
