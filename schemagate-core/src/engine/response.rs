//! Response envelope
//!
//! Every dynamic route answers with `{"success": bool, "data": ..}` or
//! `{"success": bool, "message": ..}`.

use crate::error::DynamicError;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn data(data: Value) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()) }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, data: None, message: Some(message.into()) }
    }
}

/// Result of one dynamic request, ready to be written to the wire
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: StatusCode,
    pub envelope: Envelope,
    /// `Set-Cookie` value when a token was issued
    pub set_cookie: Option<String>,
}

impl Outcome {
    pub fn new(status: StatusCode, envelope: Envelope) -> Self {
        Self { status, envelope, set_cookie: None }
    }

    pub fn with_cookie(mut self, set_cookie: Option<String>) -> Self {
        self.set_cookie = set_cookie;
        self
    }

    pub fn is_success(&self) -> bool {
        self.envelope.success
    }
}

impl From<DynamicError> for Outcome {
    fn from(error: DynamicError) -> Self {
        let status = error.status();
        if status.is_server_error() {
            log::error!("Dynamic request failed: {}", error);
        }
        Outcome::new(status, Envelope::failure(error.to_string()))
    }
}
