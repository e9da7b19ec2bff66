//! Session token configuration

use crate::security::{CookieConfig, SameSitePolicy, TokenIssuer};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// Token signing and cookie attributes
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    /// HMAC secret for issued tokens
    /// Env: JWT_SECRET
    /// Default: unset (must be provided)
    pub secret: String,

    /// Set Secure flag on token cookies
    /// Env: SG_COOKIE_SECURE
    /// Default: true
    pub cookie_secure: bool,

    /// SameSite policy: "Strict", "Lax", or "None"
    /// Env: SG_COOKIE_SAMESITE
    /// Default: "None"
    pub cookie_samesite: String,

    pub cookie_path: String,
}

impl std::fmt::Debug for TokensConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokensConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_samesite", &self.cookie_samesite)
            .field("cookie_path", &self.cookie_path)
            .finish()
    }
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_secure: true,
            cookie_samesite: "None".to_string(),
            cookie_path: "/".to_string(),
        }
    }
}

impl TokensConfig {
    pub fn merge(&mut self, other: Self) {
        // A file without a secret keeps whatever was configured before
        if !other.secret.is_empty() {
            self.secret = other.secret;
        }
        self.cookie_secure = other.cookie_secure;
        self.cookie_samesite = other.cookie_samesite;
        self.cookie_path = other.cookie_path;
    }

    pub(crate) fn apply_vars(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(secret) = var("JWT_SECRET") {
            self.secret = secret;
        }

        if let Some(secure) = var("SG_COOKIE_SECURE") {
            self.cookie_secure = secure.parse().unwrap_or(true);
        }

        if let Some(samesite) = var("SG_COOKIE_SAMESITE") {
            self.cookie_samesite = samesite;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            bail!("Token secret is not set: provide tokens.secret or JWT_SECRET");
        }

        let same_site = self.same_site()?;
        if same_site == SameSitePolicy::None && !self.cookie_secure {
            bail!("Invalid cookie settings: SameSite=None requires cookie_secure = true");
        }

        Ok(())
    }

    fn same_site(&self) -> Result<SameSitePolicy> {
        self.cookie_samesite
            .parse()
            .map_err(|e: String| anyhow!("Invalid cookie_samesite: {}", e))
    }

    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(&self.secret)
    }

    pub fn cookie_config(&self) -> Result<CookieConfig> {
        Ok(CookieConfig {
            path: self.cookie_path.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.same_site()?,
        })
    }
}
