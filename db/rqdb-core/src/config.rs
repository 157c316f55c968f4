///
/// # Handle Configuration
///
/// Describes how a `Database` handle is opened, in TOML form, so the process
/// bootstrapping the store can keep database settings next to its other
/// configuration.
///
/// ## Example
///
/// ```toml
/// path = "/var/lib/rqdb/db.sqlite"
/// dsn = "cache=shared"
/// memory = false
/// fk_constraints = true
///
/// [backup]
/// pages_per_step = -1
/// step_delay_ms = 250
/// ```
///
/// Every key is optional. `path` is ignored for in-memory handles and
/// required otherwise. `fk_constraints`, when present, is applied right
/// after the connection opens.
///

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{DbError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub path: String,
    pub dsn: String,
    pub memory: bool,
    pub fk_constraints: Option<bool>,
    pub backup: BackupConfig,
}

/// Online-backup stepping.
///
/// `pages_per_step` of -1 copies the whole database in one step.
/// `step_delay_ms` is how long to back off when a step finds the source busy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    pub pages_per_step: i32,
    pub step_delay_ms: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            pages_per_step: -1,
            step_delay_ms: 250,
        }
    }
}

impl BackupConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            dsn: String::new(),
            memory: true,
            fk_constraints: None,
            backup: BackupConfig::default(),
        }
    }
}

impl DbConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DbConfig =
            toml::from_str(content).map_err(|e| DbError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.memory && self.path.trim().is_empty() {
            return Err(DbError::InvalidConfig(
                "file-backed database requires a path".to_string(),
            ));
        }
        if self.backup.pages_per_step == 0 || self.backup.pages_per_step < -1 {
            return Err(DbError::InvalidConfig(
                "backup.pages_per_step must be positive or -1".to_string(),
            ));
        }
        Ok(())
    }
}
