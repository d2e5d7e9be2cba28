use thiserror::Error;

use crate::core::task::SubTaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Dependency graph references unknown subtask: {id}")]
    UnknownSubtask { id: SubTaskId },

    #[error("Dependency graph contains a cycle: {0}")]
    CycleDetected(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl Error {
    /// Structural-integrity errors abort a run before anything executes.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::UnknownSubtask { .. } | Error::CycleDetected(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
