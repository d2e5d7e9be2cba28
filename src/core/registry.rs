//! Capability registry and keyword pattern table.
//!
//! Both tables are plain configuration objects. An [`Engine`](crate::Engine)
//! owns one [`Catalog`]; nothing here is process-global, so several engines
//! can run side by side with different catalogs.

use crate::core::domain::{Complexity, Domain};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Identifier of a specialist worker role, e.g. `backend` or `qa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role category, which fixes the priority tier of the role's subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    /// Design and UX work runs first.
    Design,
    /// Data and schema work.
    Data,
    /// Services and backends.
    Service,
    /// User-facing interfaces.
    Interface,
    /// Testing and security review.
    Verification,
    /// Infrastructure and deployment runs last.
    Infrastructure,
    /// Anything else; scheduled alongside interface work.
    #[serde(other)]
    Unclassified,
}

impl RoleCategory {
    pub fn priority_tier(&self) -> u32 {
        match self {
            RoleCategory::Design => 1,
            RoleCategory::Data => 2,
            RoleCategory::Service => 3,
            RoleCategory::Interface => 4,
            RoleCategory::Verification => 5,
            RoleCategory::Infrastructure => 6,
            RoleCategory::Unclassified => 4,
        }
    }
}

impl Default for RoleCategory {
    fn default() -> Self {
        Self::Unclassified
    }
}

fn default_multiplier() -> f64 {
    1.0
}

/// Static description of what one role can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    /// Domains the role covers.
    pub domains: BTreeSet<Domain>,
    /// Skill tags used for recommendations.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Highest complexity tier the role can take on.
    pub max_complexity: Complexity,
    /// Maximum number of this role's subtasks running at once.
    pub parallel_capacity: usize,
    #[serde(default)]
    pub category: RoleCategory,
    /// Duration weight relative to a baseline role.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Subtask description template; `{task}` is replaced by the task text.
    #[serde(default)]
    pub template: Option<String>,
}

impl CapabilityEntry {
    pub fn covers(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }

    pub fn handles(&self, complexity: Complexity) -> bool {
        complexity <= self.max_complexity
    }
}

/// Per-role capability table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityRegistry {
    roles: BTreeMap<RoleId, CapabilityEntry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: impl Into<RoleId>, entry: CapabilityEntry) {
        self.roles.insert(role.into(), entry);
    }

    pub fn get(&self, role: &RoleId) -> Option<&CapabilityEntry> {
        self.roles.get(role)
    }

    pub fn contains(&self, role: &RoleId) -> bool {
        self.roles.contains_key(role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// All roles in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoleId, &CapabilityEntry)> {
        self.roles.iter()
    }

    /// Roles whose domain set contains `domain`.
    pub fn covering(&self, domain: Domain) -> impl Iterator<Item = (&RoleId, &CapabilityEntry)> {
        self.roles.iter().filter(move |(_, entry)| entry.covers(domain))
    }

    /// Parallel capacity for a role; unknown roles get a single slot.
    pub fn capacity(&self, role: &RoleId) -> usize {
        self.roles
            .get(role)
            .map(|entry| entry.parallel_capacity)
            .unwrap_or(1)
    }
}

/// Keyword pattern mapping task text to the roles it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPattern {
    pub name: String,
    pub keywords: Vec<String>,
    pub roles: Vec<RoleId>,
    /// Floor for the task's complexity when this pattern matches.
    #[serde(default)]
    pub complexity: Complexity,
}

impl TaskPattern {
    /// Whether any keyword occurs in `lowered` (already lowercased text).
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
    }
}

/// Pattern table plus the keyword lists that force complexity or roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTable {
    /// Any of these forces Expert complexity.
    pub expert_keywords: Vec<String>,
    /// Any of these forces Complex complexity.
    pub complex_keywords: Vec<String>,
    /// Any of these force-includes the security role.
    pub sensitive_keywords: Vec<String>,
    /// Role that reviews security-sensitive tasks.
    pub security_role: RoleId,
    /// Role that verifies Complex and Expert tasks.
    pub review_role: RoleId,
    pub entries: Vec<TaskPattern>,
}

impl PatternTable {
    /// Patterns that match `lowered`, in table order.
    pub fn matching<'a>(&'a self, lowered: &'a str) -> impl Iterator<Item = &'a TaskPattern> + 'a {
        self.entries.iter().filter(move |pattern| pattern.matches(lowered))
    }
}

/// Registry and pattern table, loaded and validated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub roles: CapabilityRegistry,
    pub patterns: PatternTable,
}

impl Catalog {
    /// Load a catalog from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading catalog");
        let catalog = Self::from_toml_str(&fs::read_to_string(path)?)?;
        debug!(roles = catalog.roles.len(), patterns = catalog.patterns.entries.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(source)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check internal consistency.
    ///
    /// Every referenced role must exist, capacities and multipliers must be
    /// positive, and some role must cover [`Domain::FullStack`] at Expert
    /// level so unmatched tasks always resolve to a role.
    pub fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            return Err(Error::Validation("catalog defines no roles".to_string()));
        }

        for (role, entry) in self.roles.iter() {
            if entry.domains.is_empty() {
                return Err(Error::Validation(format!("role {} covers no domains", role)));
            }
            if entry.parallel_capacity == 0 {
                return Err(Error::Validation(format!(
                    "role {} has zero parallel capacity",
                    role
                )));
            }
            if !(entry.multiplier.is_finite() && entry.multiplier > 0.0) {
                return Err(Error::Validation(format!(
                    "role {} has invalid multiplier {}",
                    role, entry.multiplier
                )));
            }
        }

        for role in [&self.patterns.security_role, &self.patterns.review_role] {
            if !self.roles.contains(role) {
                return Err(Error::UnknownRole(role.to_string()));
            }
        }

        for pattern in &self.patterns.entries {
            if pattern.keywords.is_empty() {
                return Err(Error::Validation(format!(
                    "pattern {} has no keywords",
                    pattern.name
                )));
            }
            if let Some(role) = pattern.roles.iter().find(|r| !self.roles.contains(r)) {
                return Err(Error::UnknownRole(role.to_string()));
            }
        }

        let full_stack_covered = self
            .roles
            .covering(Domain::FullStack)
            .any(|(_, entry)| entry.handles(Complexity::Expert));
        if !full_stack_covered {
            return Err(Error::Validation(
                "no expert-level role covers the full_stack domain".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            roles: builtin_registry(),
            patterns: builtin_patterns(),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn entry(
    domains: &[Domain],
    skills: &[&str],
    max_complexity: Complexity,
    parallel_capacity: usize,
    category: RoleCategory,
    multiplier: f64,
    template: Option<&str>,
) -> CapabilityEntry {
    CapabilityEntry {
        domains: domains.iter().copied().collect(),
        skills: words(skills),
        max_complexity,
        parallel_capacity,
        category,
        multiplier,
        template: template.map(str::to_string),
    }
}

/// The default fourteen-role registry.
pub fn builtin_registry() -> CapabilityRegistry {
    use Complexity::{Complex, Expert};
    use RoleCategory::*;

    let mut registry = CapabilityRegistry::new();
    registry.insert(
        "backend",
        entry(
            &[Domain::Backend],
            &["api", "microservices", "database", "authentication", "performance"],
            Expert,
            3,
            Service,
            1.2,
            Some("Implement backend services and APIs for: {task}"),
        ),
    );
    registry.insert(
        "frontend",
        entry(
            &[Domain::Frontend],
            &["ui", "responsive", "spa", "components", "state-management"],
            Expert,
            3,
            Interface,
            1.0,
            Some("Create user interface and frontend components for: {task}"),
        ),
    );
    registry.insert(
        "database",
        entry(
            &[Domain::Database],
            &["schema", "optimization", "migration", "replication", "nosql"],
            Expert,
            2,
            Data,
            0.8,
            Some("Design and optimize database schema for: {task}"),
        ),
    );
    registry.insert(
        "devops",
        entry(
            &[Domain::Devops],
            &["ci-cd", "infrastructure", "deployment", "monitoring", "cloud"],
            Expert,
            2,
            Infrastructure,
            1.5,
            Some("Set up infrastructure and deployment for: {task}"),
        ),
    );
    registry.insert(
        "security",
        entry(
            &[Domain::Security],
            &["audit", "penetration", "encryption", "compliance", "authentication"],
            Expert,
            2,
            Verification,
            2.0,
            Some("Perform security audit and implement security measures for: {task}"),
        ),
    );
    registry.insert(
        "qa",
        entry(
            &[Domain::Testing],
            &["unit-testing", "e2e", "performance", "automation", "coverage"],
            Complex,
            3,
            Verification,
            1.3,
            Some("Create and run comprehensive tests for: {task}"),
        ),
    );
    registry.insert(
        "ml",
        entry(
            &[Domain::MlAi],
            &["training", "models", "inference", "data-pipeline", "optimization"],
            Expert,
            1,
            Unclassified,
            3.0,
            Some("Develop and train machine learning models for: {task}"),
        ),
    );
    registry.insert(
        "mobile",
        entry(
            &[Domain::Mobile],
            &["ios", "android", "cross-platform", "native", "responsive"],
            Expert,
            2,
            Interface,
            1.5,
            Some("Implement mobile application features for: {task}"),
        ),
    );
    registry.insert(
        "game",
        entry(
            &[Domain::Game],
            &["graphics", "physics", "multiplayer", "optimization", "engines"],
            Expert,
            1,
            Unclassified,
            2.0,
            Some("Develop game mechanics and systems for: {task}"),
        ),
    );
    registry.insert(
        "iot",
        entry(
            &[Domain::Iot],
            &["embedded", "sensors", "protocols", "firmware", "edge-computing"],
            Complex,
            1,
            Unclassified,
            2.5,
            Some("Implement IoT/hardware integration for: {task}"),
        ),
    );
    registry.insert(
        "uiux",
        entry(
            &[Domain::Design],
            &["ux", "accessibility", "design-systems", "prototyping", "research"],
            Complex,
            2,
            Design,
            1.0,
            Some("Design user experience and interface for: {task}"),
        ),
    );
    registry.insert(
        "web-design",
        entry(
            &[Domain::Design, Domain::Frontend],
            &["web-design", "seo", "performance", "pwa", "responsive"],
            Complex,
            2,
            Design,
            1.2,
            Some("Create web design and implementation for: {task}"),
        ),
    );
    registry.insert(
        "refactor",
        entry(
            &[Domain::Refactoring],
            &["code-quality", "patterns", "modernization", "debt-reduction", "automation"],
            Expert,
            1,
            Unclassified,
            1.8,
            Some("Refactor and optimize code for: {task}"),
        ),
    );
    registry.insert(
        "fullstack",
        entry(
            &[Domain::FullStack],
            &["end-to-end", "integration", "prototyping"],
            Expert,
            2,
            Service,
            1.4,
            None,
        ),
    );
    registry
}

fn pattern(name: &str, keywords: &[&str], roles: &[&str], complexity: Complexity) -> TaskPattern {
    TaskPattern {
        name: name.to_string(),
        keywords: words(keywords),
        roles: roles.iter().map(|r| RoleId::new(r)).collect(),
        complexity,
    }
}

/// The default pattern table.
pub fn builtin_patterns() -> PatternTable {
    use Complexity::*;

    PatternTable {
        expert_keywords: words(&[
            "enterprise",
            "scale",
            "distributed",
            "real-time",
            "high-performance",
            "security-critical",
            "compliance",
        ]),
        complex_keywords: words(&[
            "architecture",
            "system",
            "infrastructure",
            "migration",
            "integration",
            "optimization",
            "redesign",
            "refactor",
        ]),
        sensitive_keywords: words(&[
            "auth", "login", "password", "payment", "secret", "credential", "sensitive", "secure",
        ]),
        security_role: RoleId::new("security"),
        review_role: RoleId::new("qa"),
        entries: vec![
            pattern(
                "api_creation",
                &["api", "rest", "graphql", "endpoint", "service"],
                &["backend"],
                Moderate,
            ),
            pattern(
                "ui_component",
                &["component", "ui", "interface", "widget", "frontend"],
                &["frontend"],
                Simple,
            ),
            pattern(
                "full_stack_feature",
                &["feature", "application", "full-stack", "end-to-end"],
                &["backend", "frontend", "database"],
                Complex,
            ),
            pattern(
                "realtime_messaging",
                &["chat", "messaging", "websocket", "real-time", "notification"],
                &["backend", "frontend", "database"],
                Complex,
            ),
            pattern(
                "database_optimization",
                &["database", "query", "optimize", "performance", "index", "schema"],
                &["database"],
                Moderate,
            ),
            pattern(
                "security_audit",
                &["security", "vulnerability", "audit", "penetration", "compliance"],
                &["security"],
                Complex,
            ),
            pattern(
                "deployment",
                &["deploy", "ci/cd", "pipeline", "infrastructure", "cloud", "kubernetes", "docker"],
                &["devops"],
                Moderate,
            ),
            pattern(
                "testing",
                &["test", "testing", "qa", "coverage", "automation"],
                &["qa"],
                Moderate,
            ),
            pattern(
                "ml_model",
                &["machine learning", "ml", "ai", "model", "training"],
                &["ml"],
                Complex,
            ),
            pattern(
                "mobile_app",
                &["mobile", "ios", "android", "app", "native"],
                &["mobile"],
                Complex,
            ),
            pattern(
                "game_mechanics",
                &["game", "multiplayer", "physics"],
                &["game"],
                Complex,
            ),
            pattern(
                "iot_device",
                &["iot", "firmware", "sensor", "embedded"],
                &["iot"],
                Complex,
            ),
            pattern(
                "ux_design",
                &["ux", "wireframe", "prototype", "design system", "accessibility"],
                &["uiux"],
                Moderate,
            ),
            pattern(
                "refactoring",
                &["refactor", "clean", "optimize", "modernize", "tech debt"],
                &["refactor"],
                Moderate,
            ),
        ],
    }
}
