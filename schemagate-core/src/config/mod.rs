//! Configuration system for SchemaGate
//!
//! # Configuration Hierarchy
//!
//! Configuration values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (builder / CLI flags) - Highest priority
//! 2. **Environment Variables** - Override file config
//! 3. **Config File** (schemagate.toml) - Override defaults
//! 4. **Defaults** - Lowest priority
//!
//! # Example
//!
//! ```no_run
//! use schemagate_core::config::SchemaGateConfig;
//!
//! let config = SchemaGateConfig::load()?;
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod hashing;
pub mod logging;
pub mod server;
pub mod tokens;

pub use hashing::HashingConfig;
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use tokens::TokensConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "schemagate.toml";

/// Complete SchemaGate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaGateConfig {
    pub server: ServerConfig,
    pub tokens: TokensConfig,
    pub hashing: HashingConfig,
    pub logging: LoggingConfig,
}

impl SchemaGateConfig {
    /// Load configuration with full supersedence chain
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file, if it exists, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.server.merge(other.server);
        self.tokens.merge(other.tokens);
        self.hashing.merge(other.hashing);
        self.logging.merge(other.logging);
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.apply_vars(&|name: &str| env::var(name).ok());
    }

    fn apply_vars(&mut self, var: &impl Fn(&str) -> Option<String>) {
        self.server.apply_vars(var);
        self.tokens.apply_vars(var);
        self.hashing.apply_vars(var);
        self.logging.apply_vars(var);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.tokens.validate()?;
        self.hashing.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
