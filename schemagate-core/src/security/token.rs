//! Scoped session tokens
//!
//! HS256 JWTs whose payload is a single tenant-chosen claim plus `iat` and
//! `exp`. Tokens are minted after a successful single-record operation and
//! read back when a restriction sources a value from a cookie.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

/// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by a verified token
pub type Claims = Map<String, Value>;

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies scoped tokens with one shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: secret.as_ref().to_vec() }
    }

    /// Sign `{claim_name: claim_value}` valid for `expire_in_days` days
    pub fn issue(
        &self,
        claim_name: &str,
        claim_value: Value,
        expire_in_days: u32,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(claim_name, claim_value, expire_in_days, Utc::now())
    }

    fn issue_at(
        &self,
        claim_name: &str,
        claim_value: Value,
        expire_in_days: u32,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = Duration::try_days(i64::from(expire_in_days))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(TokenError::Lifetime(expire_in_days))?;

        let mut claims = Map::new();
        claims.insert(claim_name.to_string(), claim_value);
        claims.insert("iat".to_string(), Value::from(now.timestamp()));
        claims.insert("exp".to_string(), Value::from(expires_at.timestamp()));

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.sign(&header_b64, &payload_b64)?;

        Ok(IssuedToken { token: format!("{}.{}.{}", header_b64, payload_b64, signature), expires_at })
    }

    /// Check signature and expiry, returning the payload claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::Malformed);
        }

        // Constant-time comparison (prevents timing attacks)
        self.verify_signature(parts[0], parts[1], parts[2])?;

        let payload = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        let exp = claims.get("exp").and_then(Value::as_i64).ok_or(TokenError::Malformed)?;
        if exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn sign(&self, header: &str, payload: &str) -> Result<String, TokenError> {
        let mut mac = self.mac()?;
        mac.update(format!("{}.{}", header, payload).as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn verify_signature(&self, header: &str, payload: &str, signature: &str) -> Result<(), TokenError> {
        let mut mac = self.mac()?;
        mac.update(format!("{}.{}", header, payload).as_bytes());

        let signature_bytes = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::BadSignature)?;
        mac.verify_slice(&signature_bytes).map_err(|_| TokenError::BadSignature)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("token lifetime of {0} days is out of range")]
    Lifetime(u32),
}
