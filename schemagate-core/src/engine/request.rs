//! Request view and value resolution
//!
//! [`DynamicRequest`] is the transport-independent view of an incoming
//! request: query parameters, JSON body, headers and cookies.
//! [`ValueResolver`] reads a restriction value out of it.

use crate::error::{DynamicError, DynamicResult};
use crate::schema::{Location, ValueSource};
use crate::security::{TokenCookie, TokenIssuer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parsed request data the engine reads restriction values from
#[derive(Debug, Clone, Default)]
pub struct DynamicRequest {
    query: HashMap<String, String>,
    body: Map<String, Value>,
    /// Lower-cased header names
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
}

impl DynamicRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from HTTP request parts and the collected body bytes
    pub fn from_http(parts: &http::request::Parts, body: &[u8]) -> DynamicResult<Self> {
        let query = parts.uri.query().map(parse_query).unwrap_or_default();

        let mut headers = HashMap::new();
        for (name, value) in &parts.headers {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), value.to_string());
            }
        }

        let cookies = parts
            .headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| TokenCookie::parse_header(header).into_iter())
            .collect();

        let is_form = headers
            .get("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let body = parse_body(body, is_form)?;

        Ok(Self { query, body, headers, cookies })
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.body.insert(name.into(), value);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map(|v| v.into_owned()).unwrap_or(spaced)
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

fn parse_body(body: &[u8], is_form: bool) -> DynamicResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    if is_form {
        let text = std::str::from_utf8(body)
            .map_err(|e| DynamicError::InvalidBody(format!("invalid UTF-8: {}", e)))?;
        return Ok(parse_query(text).into_iter().map(|(k, v)| (k, Value::String(v))).collect());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DynamicError::InvalidBody("expected a JSON object".to_string())),
        Err(e) => Err(DynamicError::InvalidBody(e.to_string())),
    }
}

/// Reads restriction values out of a [`DynamicRequest`]
#[derive(Debug, Clone)]
pub struct ValueResolver {
    tokens: TokenIssuer,
}

impl ValueResolver {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self { tokens }
    }

    /// Value named by `source`, or `None` when the request does not carry it
    ///
    /// Cookie sources are signed tokens: the cookie named `attribute_name` is
    /// verified and the claim of the same name is returned. A missing cookie
    /// or a token that fails verification is an authentication error.
    pub fn resolve(
        &self,
        request: &DynamicRequest,
        source: &ValueSource,
    ) -> DynamicResult<Option<Value>> {
        let name = source.attribute_name.as_str();

        let value = match source.location {
            Location::Query => request.query(name).map(|v| Value::String(v.to_string())),
            Location::Body => request.body().get(name).filter(|v| !v.is_null()).cloned(),
            Location::Headers => request.header(name).map(|v| Value::String(v.to_string())),
            Location::Cookies => {
                let token =
                    request.cookie(name).ok_or_else(|| DynamicError::MissingToken(name.to_string()))?;
                let claims = self.tokens.verify(token).map_err(|e| {
                    log::debug!("Rejected token from cookie {}: {}", name, e);
                    DynamicError::InvalidSession(e.to_string())
                })?;
                claims.get(name).filter(|v| !v.is_null()).cloned()
            }
        };

        Ok(value)
    }

    /// Like [`ValueResolver::resolve`] but an absent value is a restriction failure
    pub fn require(&self, request: &DynamicRequest, source: &ValueSource) -> DynamicResult<Value> {
        self.resolve(request, source)?
            .ok_or_else(|| DynamicError::MissingRestrictionValue(source.attribute_name.clone()))
    }
}
