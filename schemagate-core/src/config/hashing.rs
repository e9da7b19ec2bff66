//! Hashed field cost parameters

use crate::security::FieldHasher;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Argon2id cost parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Env: SG_HASH_MEMORY_KIB
    /// Default: 19456 (19 MiB)
    pub memory_kib: u32,

    /// Env: SG_HASH_ITERATIONS
    /// Default: 2
    pub iterations: u32,

    /// Env: SG_HASH_PARALLELISM
    /// Default: 1
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self { memory_kib: 19456, iterations: 2, parallelism: 1 }
    }
}

impl HashingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub(crate) fn apply_vars(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(Ok(m)) = var("SG_HASH_MEMORY_KIB").map(|v| v.parse()) {
            self.memory_kib = m;
        }
        if let Some(Ok(t)) = var("SG_HASH_ITERATIONS").map(|v| v.parse()) {
            self.iterations = t;
        }
        if let Some(Ok(p)) = var("SG_HASH_PARALLELISM").map(|v| v.parse()) {
            self.parallelism = p;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 || self.parallelism == 0 {
            bail!("Invalid hashing parameters: iterations and parallelism must be greater than 0");
        }
        // Argon2 needs at least 8 KiB per lane
        if self.memory_kib < 8 * self.parallelism {
            bail!("Invalid memory_kib: must be at least 8 * parallelism");
        }
        Ok(())
    }

    pub fn hasher(&self) -> Result<FieldHasher> {
        FieldHasher::with_params(self.memory_kib, self.iterations, self.parallelism)
            .context("Failed to build field hasher")
    }
}
