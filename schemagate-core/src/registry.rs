//! Collection registry
//!
//! Turns a stored field list into a typed [`CollectionHandle`] and keeps one
//! handle per deterministic collection name. The registry is an explicit
//! component owned by the engine; two engines never share handles.
//!
//! Names are built from owner, project and schema name with every whitespace
//! run replaced by `_`, so the same three inputs always address the same
//! collection:
//!
//! ```text
//! ("alice smith", "My Shop", "Order Line")  ->  alice_smith_My_Shop_Order_Line
//! ```

use crate::schema::{Field, FieldType};
use crate::store::{DocumentStore, DynamicRecord, Filter, StoreResult};
use scc::HashMap as SccHashMap;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Deterministic collection name for `(owner, project, schema)`
pub fn collection_name(owner: &str, project: &str, schema: &str) -> String {
    [owner, project, schema].iter().map(|part| normalize_part(part)).collect::<Vec<_>>().join("_")
}

fn normalize_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut in_whitespace = false;
    for c in part.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

/// Storage-level description of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub storage_type: FieldType,
    pub required: bool,
    pub unique: bool,
    /// Excluded from default projections
    pub hidden: bool,
}

impl FieldShape {
    pub fn from_field(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            storage_type: field.field_type,
            required: field.is_required,
            unique: field.is_unique,
            hidden: field.is_hashed,
        }
    }

    /// Coerce a request value (query strings, headers) to this field's storage type
    ///
    /// Values that cannot be coerced are returned unchanged so equality fails
    /// naturally instead of matching something unintended.
    pub fn cast(&self, value: &Value) -> Value {
        let Value::String(raw) = value else {
            return value.clone();
        };

        match self.storage_type {
            FieldType::Number | FieldType::Decimal128 | FieldType::BigInt => {
                if let Ok(int) = raw.trim().parse::<i64>() {
                    return Value::Number(int.into());
                }
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone())
            }
            FieldType::Boolean => match raw.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value.clone(),
            },
            _ => value.clone(),
        }
    }

    /// Whether `value` is storable in this field
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }

        match self.storage_type {
            FieldType::String | FieldType::ObjectId | FieldType::Uuid | FieldType::Buffer => {
                value.is_string() || value.is_number() || value.is_boolean()
            }
            FieldType::Number | FieldType::Decimal128 | FieldType::BigInt => {
                value.is_number() || self.cast(value).is_number()
            }
            FieldType::Boolean => value.is_boolean() || self.cast(value).is_boolean(),
            FieldType::Date => match value {
                Value::String(s) => chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
                Value::Number(_) => true,
                _ => false,
            },
            FieldType::Array => value.is_array(),
            FieldType::Map => value.is_object(),
            FieldType::Mixed => true,
        }
    }
}

/// Storage-level description of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
    /// Undeclared keys are dropped on write
    pub strict: bool,
    /// Records carry `createdAt` / `updatedAt`
    pub timestamps: bool,
}

impl CollectionShape {
    pub fn from_fields(name: impl Into<String>, fields: &[Field]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(FieldShape::from_field).collect(),
            strict: true,
            timestamps: true,
        }
    }

    /// Untyped shape used for collections only ever referenced, never declared
    pub fn permissive(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), strict: false, timestamps: false }
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Typed accessor over one dynamic collection
pub struct CollectionHandle {
    shape: CollectionShape,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle").field("shape", &self.shape).finish()
    }
}

impl CollectionHandle {
    pub fn new(shape: CollectionShape, store: Arc<dyn DocumentStore>) -> Self {
        Self { shape, store }
    }

    pub fn name(&self) -> &str {
        &self.shape.name
    }

    pub fn shape(&self) -> &CollectionShape {
        &self.shape
    }

    pub async fn find(&self, filter: &Filter) -> StoreResult<Vec<DynamicRecord>> {
        self.store.find(&self.shape.name, filter).await
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<DynamicRecord>> {
        self.store.find_by_id(&self.shape.name, id).await
    }

    pub async fn create(&self, document: Map<String, Value>) -> StoreResult<DynamicRecord> {
        self.store.insert(&self.shape, self.cast_document(document)).await
    }

    pub async fn update_one(
        &self,
        filter: &Filter,
        changes: Map<String, Value>,
    ) -> StoreResult<Option<DynamicRecord>> {
        self.store.update_one(&self.shape, filter, self.cast_document(changes)).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> StoreResult<usize> {
        self.store.delete_many(&self.shape.name, filter).await
    }

    /// Coerce declared fields to their storage type before writing
    fn cast_document(&self, mut document: Map<String, Value>) -> Map<String, Value> {
        for (key, value) in document.iter_mut() {
            if let Some(field) = self.shape.field(key) {
                *value = field.cast(value);
            }
        }
        document
    }

    /// Default projection of a record: hidden fields removed
    pub fn render(&self, record: &DynamicRecord) -> Value {
        let mut json = record.to_json();
        if let Value::Object(ref mut object) = json {
            for field in self.shape.fields.iter().filter(|f| f.hidden) {
                object.remove(&field.name);
            }
        }
        json
    }
}

/// Register-once map from collection name to handle
pub struct CollectionRegistry {
    handles: SccHashMap<String, Arc<CollectionHandle>>,
    store: Arc<dyn DocumentStore>,
}

impl CollectionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { handles: SccHashMap::new(), store }
    }

    /// Handle for a declared schema, created from `fields` on first use
    ///
    /// A later call for the same name returns the existing handle even if
    /// `fields` differ; the first typed registration wins. A permissive
    /// handle registered earlier through a related lookup is replaced.
    pub async fn get_or_create(
        &self,
        owner: &str,
        project: &str,
        schema: &str,
        fields: &[Field],
    ) -> Arc<CollectionHandle> {
        let name = collection_name(owner, project, schema);
        self.register(name, true, |name| CollectionShape::from_fields(name, fields)).await
    }

    /// Handle for a collection referenced by name only, registered untyped if new
    pub async fn get_or_create_permissive(&self, name: &str) -> Arc<CollectionHandle> {
        self.register(name.to_string(), false, CollectionShape::permissive).await
    }

    pub async fn get(&self, name: &str) -> Option<Arc<CollectionHandle>> {
        self.handles.read_async(name, |_, handle| handle.clone()).await
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    async fn register<F>(&self, name: String, typed: bool, build: F) -> Arc<CollectionHandle>
    where
        F: FnOnce(String) -> CollectionShape,
    {
        match self.handles.entry_async(name.clone()).await {
            scc::hash_map::Entry::Occupied(mut entry) => {
                if typed && !entry.get().shape.strict {
                    let handle = self.build_handle(build(name));
                    *entry.get_mut() = handle.clone();
                    return handle;
                }
                entry.get().clone()
            }
            scc::hash_map::Entry::Vacant(entry) => {
                let handle = self.build_handle(build(name));
                entry.insert_entry(handle.clone());
                handle
            }
        }
    }

    fn build_handle(&self, shape: CollectionShape) -> Arc<CollectionHandle> {
        log::debug!(
            "Registering collection {} ({} fields, strict: {})",
            shape.name,
            shape.fields.len(),
            shape.strict
        );
        Arc::new(CollectionHandle::new(shape, self.store.clone()))
    }
}
