//! Domains and complexity tiers used to route work to roles.

use serde::{Deserialize, Serialize};

/// A functional area of work.
///
/// Ordering is only used to keep domain sets deterministic; it carries no
/// meaning beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Backend,
    Frontend,
    Database,
    Devops,
    Security,
    Testing,
    MlAi,
    Mobile,
    Game,
    Iot,
    Design,
    Refactoring,
    FullStack,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Backend => "backend",
            Domain::Frontend => "frontend",
            Domain::Database => "database",
            Domain::Devops => "devops",
            Domain::Security => "security",
            Domain::Testing => "testing",
            Domain::MlAi => "ml_ai",
            Domain::Mobile => "mobile",
            Domain::Game => "game",
            Domain::Iot => "iot",
            Domain::Design => "design",
            Domain::Refactoring => "refactoring",
            Domain::FullStack => "full_stack",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordinal task difficulty: Simple < Moderate < Complex < Expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    /// Complexity implied by the number of domains a task touches.
    pub fn from_domain_count(count: usize) -> Self {
        match count {
            0 | 1 => Complexity::Simple,
            2 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }

    /// Complex and Expert tasks always get a verification pass.
    pub fn requires_review(&self) -> bool {
        *self >= Complexity::Complex
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Expert => "expert",
        }
    }
}

impl Default for Complexity {
    fn default() -> Self {
        Self::Simple
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
