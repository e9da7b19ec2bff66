//! Error taxonomy of the dynamic engine
//!
//! Every failure raised while serving a dynamic route is a [`DynamicError`].
//! The HTTP boundary turns it into the response envelope through
//! [`DynamicError::status`], nothing below that boundary builds responses.

use crate::security::{HashError, TokenError};
use crate::store::StoreError;
use http::StatusCode;

/// Result type of the dynamic engine
pub type DynamicResult<T> = Result<T, DynamicError>;

#[derive(thiserror::Error, Debug)]
pub enum DynamicError {
    /// No `(route, operation)` pair declared on the schema
    #[error("Unauthorized operation")]
    UnauthorizedOperation,

    /// A cookie-sourced value was requested but the cookie is absent
    #[error("Session token not found in cookie: {0}")]
    MissingToken(String),

    /// The cookie token failed signature, expiry or payload checks
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Invalid restriction location: {0}")]
    InvalidLocation(String),

    /// A restriction points at a request attribute that is not there
    #[error("Missing value for restricted attribute: {0}")]
    MissingRestrictionValue(String),

    #[error("Validation failed for field: {0}")]
    RestrictionValidation(String),

    #[error("No records found in the related schema: {0}")]
    RelatedRecordNotFound(String),

    /// No candidate record verified a hashed restriction
    #[error("Restriction check failed")]
    RestrictionCheckFailed,

    #[error("No data found")]
    NotFound,

    #[error("Schema not found")]
    SchemaNotFound,

    #[error("Project not found")]
    ProjectNotFound,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Method {0} is not supported on dynamic routes")]
    UnsupportedMethod(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("{0}")]
    Internal(String),
}

impl DynamicError {
    /// Status code the response envelope is sent with
    pub fn status(&self) -> StatusCode {
        match self {
            DynamicError::UnauthorizedOperation
            | DynamicError::MissingRestrictionValue(_)
            | DynamicError::RestrictionValidation(_)
            | DynamicError::RelatedRecordNotFound(_)
            | DynamicError::RestrictionCheckFailed => StatusCode::FORBIDDEN,
            DynamicError::MissingToken(_) | DynamicError::InvalidSession(_) => {
                StatusCode::UNAUTHORIZED
            }
            DynamicError::NotFound | DynamicError::SchemaNotFound | DynamicError::ProjectNotFound => {
                StatusCode::NOT_FOUND
            }
            DynamicError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            DynamicError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DynamicError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            DynamicError::Storage(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            DynamicError::Storage(StoreError::MissingRequired { .. }) => StatusCode::BAD_REQUEST,
            DynamicError::InvalidLocation(_)
            | DynamicError::Storage(_)
            | DynamicError::Hashing(_)
            | DynamicError::Token(_)
            | DynamicError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is an authentication problem rather than a denial
    pub fn is_authentication(&self) -> bool {
        matches!(self, DynamicError::MissingToken(_) | DynamicError::InvalidSession(_))
    }
}
