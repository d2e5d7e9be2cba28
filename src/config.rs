use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::{Catalog, RoleId};
use crate::orchestration::{FailurePolicy, SchedulerOptions, DEFAULT_SECS_PER_CHAR, DEFAULT_TIMEOUT_SECS};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub failure_policy: FailurePolicy,
    pub default_timeout_secs: u64,
    /// Estimate base rate in seconds per character of task text.
    pub secs_per_char: f64,
    /// TOML catalog replacing the built-in roles and patterns.
    pub catalog: Option<String>,
    /// Per-role overrides of `default_timeout_secs`.
    pub role_timeouts: BTreeMap<RoleId, u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            secs_per_char: DEFAULT_SECS_PER_CHAR,
            catalog: None,
            role_timeouts: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn taskforge_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskforge"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskforge_dir()?.join("taskforge.toml"))
    }

    /// Load `~/.taskforge/taskforge.toml`, or defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        debug!(
            path = %path.display(),
            policy = %config.failure_policy,
            default_timeout_secs = config.default_timeout_secs,
            catalog = ?config.catalog,
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::taskforge_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_secs == 0 {
            return Err(Error::Validation(
                "default_timeout_secs must be positive".to_string(),
            ));
        }
        if let Some((role, _)) = self.role_timeouts.iter().find(|(_, secs)| **secs == 0) {
            return Err(Error::Validation(format!(
                "timeout for role {} must be positive",
                role
            )));
        }
        if !self.secs_per_char.is_finite() || self.secs_per_char < 0.0 {
            return Err(Error::Validation(
                "secs_per_char must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(&expand_tilde(path)),
            None => Ok(Catalog::default()),
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        let role_timeouts: HashMap<RoleId, Duration> = self
            .role_timeouts
            .iter()
            .map(|(role, secs)| (role.clone(), Duration::from_secs(*secs)))
            .collect();
        SchedulerOptions {
            policy: self.failure_policy,
            default_timeout: Duration::from_secs(self.default_timeout_secs),
            role_timeouts,
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
