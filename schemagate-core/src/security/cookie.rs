//! Token cookies

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

/// SameSite cookie policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl SameSitePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        }
    }
}

impl FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Strict" => Ok(SameSitePolicy::Strict),
            "Lax" => Ok(SameSitePolicy::Lax),
            "None" => Ok(SameSitePolicy::None),
            other => Err(format!("unknown SameSite policy: {}", other)),
        }
    }
}

/// Attributes shared by every token cookie
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub path: String,

    /// Secure flag (HTTPS only)
    pub secure: bool,

    /// HttpOnly flag (no JavaScript access)
    pub http_only: bool,

    pub same_site: SameSitePolicy,
}

impl Default for CookieConfig {
    fn default() -> Self {
        // Cross-site capable: the tenant's frontend usually lives on another origin
        Self { path: "/".to_string(), secure: true, http_only: true, same_site: SameSitePolicy::None }
    }
}

/// Builds `Set-Cookie` values for issued tokens and reads `Cookie` headers
#[derive(Debug, Clone, Default)]
pub struct TokenCookie {
    config: CookieConfig,
}

impl TokenCookie {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    /// Build a Set-Cookie header value expiring with the token
    pub fn build_set_cookie(&self, name: &str, token: &str, expires_at: DateTime<Utc>) -> String {
        let mut parts = vec![format!("{}={}", name, token)];

        parts.push(format!("Path={}", self.config.path));
        parts.push(format!("Expires={}", expires_at.format("%a, %d %b %Y %H:%M:%S GMT")));

        if self.config.secure {
            parts.push("Secure".to_string());
        }

        if self.config.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.push(format!("SameSite={}", self.config.same_site.as_str()));

        parts.join("; ")
    }

    /// Parse every `name=value` pair of a Cookie header. Later duplicates win.
    pub fn parse_header(cookie_header: &str) -> HashMap<String, String> {
        cookie_header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                let value = urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_else(|_| value.to_string());
                Some((name.to_string(), value))
            })
            .collect()
    }
}
