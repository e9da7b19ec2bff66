//! Tenant-declared schema definitions
//!
//! A [`SchemaDefinition`] is the stored description of one dynamic collection:
//! its fields, and the list of routes ([`MethodDefinition`]) through which the
//! collection may be read or written. Each route carries [`Restriction`]s that
//! the engine evaluates against the incoming request.
//!
//! The wire format follows the JSON documents tenants submit:
//!
//! ```json
//! {
//!   "_id": "66b1...",
//!   "schema_name": "User",
//!   "project_id": "66a0...",
//!   "fields": [{ "name": "password", "type": "String", "isHashed": true }],
//!   "methodsList": [{
//!     "method": "READ",
//!     "route_name": "login",
//!     "restrictions": [{
//!       "type": "SAME_SCHEMA",
//!       "location": "body",
//!       "attribute_name": "email",
//!       "field_name": "email"
//!     }],
//!     "sendToken": true,
//!     "tokenName": "session",
//!     "expireInDays": 3
//!   }]
//! }
//! ```

use crate::error::DynamicError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage type a declared field maps to.
///
/// Type names follow the document-store vocabulary tenants already use. Any
/// name that is not recognised falls back to [`FieldType::String`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Number,
    Decimal128,
    BigInt,
    Boolean,
    Date,
    ObjectId,
    Uuid,
    Buffer,
    Array,
    Map,
    Mixed,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Decimal128 => "Decimal128",
            FieldType::BigInt => "BigInt",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "Date",
            FieldType::ObjectId => "ObjectId",
            FieldType::Uuid => "UUID",
            FieldType::Buffer => "Buffer",
            FieldType::Array => "Array",
            FieldType::Map => "Map",
            FieldType::Mixed => "Mixed",
        }
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        match name {
            "Number" => FieldType::Number,
            "Decimal128" => FieldType::Decimal128,
            "BigInt" => FieldType::BigInt,
            "Boolean" => FieldType::Boolean,
            "Date" => FieldType::Date,
            "ObjectId" => FieldType::ObjectId,
            "UUID" => FieldType::Uuid,
            "Buffer" => FieldType::Buffer,
            "Array" => FieldType::Array,
            "Map" => FieldType::Map,
            "Mixed" => FieldType::Mixed,
            _ => FieldType::String,
        }
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        FieldType::from(name.as_str())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field of a dynamic collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub is_required: bool,

    #[serde(default)]
    pub is_unique: bool,

    /// Stored as a one-way hash; only ever compared through verification
    #[serde(default)]
    pub is_hashed: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_required: false,
            is_unique: false,
            is_hashed: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn hashed(mut self) -> Self {
        self.is_hashed = true;
        self
    }
}

/// CRUD operation a route grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Map an HTTP verb onto the operation it requests
    pub fn from_method(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(Operation::Read),
            http::Method::POST => Some(Operation::Create),
            http::Method::PUT => Some(Operation::Update),
            http::Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    /// HTTP verb serving this operation
    pub fn http_method(&self) -> &'static str {
        match self {
            Operation::Create => "POST",
            Operation::Read => "GET",
            Operation::Update => "PUT",
            Operation::Delete => "DELETE",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the request a restriction value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Location {
    Query,
    Body,
    Headers,
    Cookies,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Query => "query",
            Location::Body => "body",
            Location::Headers => "headers",
            Location::Cookies => "cookies",
        }
    }
}

impl FromStr for Location {
    type Err = DynamicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Location::Query),
            "body" => Ok(Location::Body),
            "headers" => Ok(Location::Headers),
            "cookies" => Ok(Location::Cookies),
            other => Err(DynamicError::InvalidLocation(other.to_string())),
        }
    }
}

impl TryFrom<String> for Location {
    type Error = DynamicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.as_str().to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to find a value in the request: a location plus the name under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSource {
    pub location: Location,
    pub attribute_name: String,
}

impl ValueSource {
    pub fn new(location: Location, attribute_name: impl Into<String>) -> Self {
        Self { location, attribute_name: attribute_name.into() }
    }
}

/// Restriction comparing against the route's own collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SameSchemaRestriction {
    pub location: Location,
    pub attribute_name: String,
    pub field_name: String,
}

/// Restriction comparing against one record of another collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantSchemaRestriction {
    pub related_schema_name: String,
    pub field_name: String,
    pub location: Location,
    pub attribute_name: String,
    /// Where the related record's identifier comes from
    pub related_schema_id: ValueSource,
}

/// Declarative rule attached to a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Restriction {
    #[serde(rename = "SAME_SCHEMA")]
    SameSchema(SameSchemaRestriction),
    #[serde(rename = "RELEVANT_SCHEMA")]
    RelevantSchema(RelevantSchemaRestriction),
}

impl Restriction {
    pub fn same_schema(
        location: Location,
        attribute_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Restriction::SameSchema(SameSchemaRestriction {
            location,
            attribute_name: attribute_name.into(),
            field_name: field_name.into(),
        })
    }

    pub fn relevant_schema(
        related_schema_name: impl Into<String>,
        field_name: impl Into<String>,
        value: ValueSource,
        related_id: ValueSource,
    ) -> Self {
        Restriction::RelevantSchema(RelevantSchemaRestriction {
            related_schema_name: related_schema_name.into(),
            field_name: field_name.into(),
            location: value.location,
            attribute_name: value.attribute_name,
            related_schema_id: related_id,
        })
    }

    /// Field the restriction targets
    pub fn field_name(&self) -> &str {
        match self {
            Restriction::SameSchema(r) => &r.field_name,
            Restriction::RelevantSchema(r) => &r.field_name,
        }
    }

    /// Request attribute carrying the compared value
    pub fn attribute_name(&self) -> &str {
        match self {
            Restriction::SameSchema(r) => &r.attribute_name,
            Restriction::RelevantSchema(r) => &r.attribute_name,
        }
    }

    pub fn source(&self) -> ValueSource {
        match self {
            Restriction::SameSchema(r) => ValueSource::new(r.location, r.attribute_name.clone()),
            Restriction::RelevantSchema(r) => {
                ValueSource::new(r.location, r.attribute_name.clone())
            }
        }
    }

    /// Every request location this restriction reads from
    pub fn sources(&self) -> Vec<ValueSource> {
        match self {
            Restriction::SameSchema(_) => vec![self.source()],
            Restriction::RelevantSchema(r) => vec![self.source(), r.related_schema_id.clone()],
        }
    }
}

/// Longest token lifetime a route may declare
pub const MAX_EXPIRE_IN_DAYS: u32 = 3650;

/// RFC 6265 cookie-name: a non-empty token of visible ASCII without separators
fn is_cookie_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";
    !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}

fn default_token_name() -> String {
    "token".to_string()
}

fn default_expire_in_days() -> u32 {
    1
}

/// A route through which one operation on the collection is allowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub method: Operation,
    pub route_name: String,

    #[serde(default)]
    pub restrictions: Vec<Restriction>,

    #[serde(rename = "sendToken", default)]
    pub send_token: bool,

    #[serde(rename = "tokenName", default = "default_token_name")]
    pub token_name: String,

    #[serde(rename = "expireInDays", default = "default_expire_in_days")]
    pub expire_in_days: u32,
}

impl MethodDefinition {
    pub fn new(method: Operation, route_name: impl Into<String>) -> Self {
        Self {
            method,
            route_name: route_name.into(),
            restrictions: Vec::new(),
            send_token: false,
            token_name: default_token_name(),
            expire_in_days: default_expire_in_days(),
        }
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn with_token(mut self, token_name: impl Into<String>, expire_in_days: u32) -> Self {
        self.send_token = true;
        self.token_name = token_name.into();
        self.expire_in_days = expire_in_days;
        self
    }

    /// Check the cookie name and lifetime of a token-issuing route
    pub fn validate_token(&self) -> Result<(), String> {
        if !self.send_token {
            return Ok(());
        }
        if !is_cookie_name(&self.token_name) {
            return Err(format!(
                "route {} declares an invalid tokenName: {:?}",
                self.route_name, self.token_name
            ));
        }
        if self.expire_in_days > MAX_EXPIRE_IN_DAYS {
            return Err(format!(
                "route {} declares expireInDays {} (at most {})",
                self.route_name, self.expire_in_days, MAX_EXPIRE_IN_DAYS
            ));
        }
        Ok(())
    }
}

/// Stored definition of one dynamic collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(rename = "_id")]
    pub id: String,

    pub schema_name: String,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(rename = "methodsList", default)]
    pub methods_list: Vec<MethodDefinition>,

    pub project_id: String,
}

impl SchemaDefinition {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Whether `name` is a hashed field of this schema. Undeclared names are plain.
    pub fn is_hashed(&self, name: &str) -> bool {
        self.field(name).is_some_and(|field| field.is_hashed)
    }

    /// Look up the route declared for `(route_name, operation)`
    pub fn find_method(&self, route_name: &str, operation: Operation) -> Option<&MethodDefinition> {
        self.methods_list
            .iter()
            .find(|method| method.route_name == route_name && method.method == operation)
    }
}

/// Project owning a set of schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_name: String,
    /// Owner's user name, part of every collection name in the project
    pub user_name: String,
}
