//! Document storage seam
//!
//! The engine talks to persistence only through [`DocumentStore`]: find,
//! create, update and delete by [`Filter`], each record carrying a generated
//! identifier. [`MemoryDocumentStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryDocumentStore;

use crate::registry::CollectionShape;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Storage result type
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate value for unique field '{field}' in {collection}")]
    UniqueViolation { collection: String, field: String },

    #[error("Field '{field}' is required in {collection}")]
    MissingRequired { collection: String, field: String },
}

/// Untyped document stored in a dynamic collection
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRecord {
    /// Opaque generated identifier
    pub id: String,
    pub fields: Map<String, Value>,
}

impl DynamicRecord {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Full JSON view, `_id` included. Hidden fields are NOT removed here,
    /// use [`crate::registry::CollectionHandle::render`] for responses.
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("_id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Equality filter over record fields, optionally pinned to one identifier
///
/// An empty filter matches every record. A `null` value matches records where
/// the field is absent or null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    id: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identifier key on top of the existing field keys
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fields.is_empty()
    }

    pub fn matches(&self, record: &DynamicRecord) -> bool {
        if let Some(ref id) = self.id {
            if record.id != *id {
                return false;
            }
        }

        self.fields.iter().all(|(field, expected)| match (record.get(field), expected) {
            (None, Value::Null) => true,
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        })
    }
}

/// Persistence primitives the engine needs
///
/// Implementations must make the unique-field check and the write it guards
/// atomic with respect to other writers of the same collection.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// All records of `collection` matching `filter`, in insertion order
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<DynamicRecord>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<DynamicRecord>>;

    /// Insert one document, enforcing the shape's required and unique fields
    async fn insert(
        &self,
        shape: &CollectionShape,
        document: Map<String, Value>,
    ) -> StoreResult<DynamicRecord>;

    /// Merge `changes` into the first record matching `filter` and return it
    async fn update_one(
        &self,
        shape: &CollectionShape,
        filter: &Filter,
        changes: Map<String, Value>,
    ) -> StoreResult<Option<DynamicRecord>>;

    /// Remove every record matching `filter`, returning how many were removed
    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize>;
}
