//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, e.g. "info" or "schemagate_core=debug"
    /// Env: SG_LOG_LEVEL
    pub level: String,
    pub module_path: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), module_path: false }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub(crate) fn apply_vars(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("SG_LOG_LEVEL") {
            self.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            bail!("Invalid logging level: must not be empty");
        }
        Ok(())
    }
}
