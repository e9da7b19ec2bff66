//! In-memory document storage
//!
//! Collections live in a lock-free `scc::HashMap` keyed by collection name.
//! Writes go through `entry_async`, which holds the collection's entry for the
//! duration of the write, so the unique-field scan and the write it guards
//! cannot interleave with another writer of the same collection.

use super::{DocumentStore, DynamicRecord, Filter, StoreError, StoreResult};
use crate::registry::CollectionShape;
use chrono::{SecondsFormat, Utc};
use scc::HashMap as SccHashMap;
use serde_json::{Map, Value};

/// In-memory document store
///
/// Records are kept in insertion order per collection and lost on restart.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: SccHashMap<String, Vec<DynamicRecord>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self { collections: SccHashMap::new() }
    }

    fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    fn timestamp() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Drop undeclared keys for strict shapes; `_id` is never user-writable
    fn sanitize(shape: &CollectionShape, mut document: Map<String, Value>) -> Map<String, Value> {
        document.remove("_id");
        if shape.strict {
            document.retain(|key, _| shape.field(key).is_some());
        }
        document
    }

    fn check_required(shape: &CollectionShape, fields: &Map<String, Value>) -> StoreResult<()> {
        for field in shape.fields.iter().filter(|f| f.required) {
            match fields.get(&field.name) {
                None | Some(Value::Null) => {
                    return Err(StoreError::MissingRequired {
                        collection: shape.name.clone(),
                        field: field.name.clone(),
                    });
                }
                Some(Value::String(s)) if s.is_empty() => {
                    return Err(StoreError::MissingRequired {
                        collection: shape.name.clone(),
                        field: field.name.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Reject `candidate` if a unique field collides with any record other than `skip_id`
    fn check_unique(
        shape: &CollectionShape,
        records: &[DynamicRecord],
        candidate: &Map<String, Value>,
        skip_id: Option<&str>,
    ) -> StoreResult<()> {
        for field in shape.fields.iter().filter(|f| f.unique) {
            let value = match candidate.get(&field.name) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let taken = records
                .iter()
                .filter(|record| Some(record.id.as_str()) != skip_id)
                .any(|record| record.get(&field.name) == Some(value));

            if taken {
                return Err(StoreError::UniqueViolation {
                    collection: shape.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<DynamicRecord>> {
        let records = self
            .collections
            .read_async(collection, |_, records| {
                records.iter().filter(|record| filter.matches(record)).cloned().collect()
            })
            .await;
        Ok(records.unwrap_or_default())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<DynamicRecord>> {
        let record = self
            .collections
            .read_async(collection, |_, records| {
                records.iter().find(|record| record.id == id).cloned()
            })
            .await;
        Ok(record.flatten())
    }

    async fn insert(
        &self,
        shape: &CollectionShape,
        document: Map<String, Value>,
    ) -> StoreResult<DynamicRecord> {
        let mut fields = Self::sanitize(shape, document);
        Self::check_required(shape, &fields)?;

        if shape.timestamps {
            let now = Self::timestamp();
            fields.insert("createdAt".to_string(), now.clone());
            fields.insert("updatedAt".to_string(), now);
        }

        let mut entry = self.collections.entry_async(shape.name.clone()).await.or_default();
        let records = entry.get_mut();
        Self::check_unique(shape, records, &fields, None)?;

        let record = DynamicRecord::new(Self::generate_id(), fields);
        records.push(record.clone());
        log::debug!("Inserted record {} into {}", record.id, shape.name);
        Ok(record)
    }

    async fn update_one(
        &self,
        shape: &CollectionShape,
        filter: &Filter,
        changes: Map<String, Value>,
    ) -> StoreResult<Option<DynamicRecord>> {
        let changes = Self::sanitize(shape, changes);

        let mut entry = match self.collections.entry_async(shape.name.clone()).await {
            scc::hash_map::Entry::Occupied(entry) => entry,
            scc::hash_map::Entry::Vacant(_) => return Ok(None),
        };
        let records = entry.get_mut();

        let Some(index) = records.iter().position(|record| filter.matches(record)) else {
            return Ok(None);
        };

        let mut merged = records[index].fields.clone();
        for (key, value) in changes {
            merged.insert(key, value);
        }
        if shape.timestamps {
            merged.insert("updatedAt".to_string(), Self::timestamp());
        }

        Self::check_required(shape, &merged)?;
        Self::check_unique(shape, records, &merged, Some(&records[index].id))?;

        records[index].fields = merged;
        log::debug!("Updated record {} in {}", records[index].id, shape.name);
        Ok(Some(records[index].clone()))
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let mut entry = match self.collections.entry_async(collection.to_string()).await {
            scc::hash_map::Entry::Occupied(entry) => entry,
            scc::hash_map::Entry::Vacant(_) => return Ok(0),
        };
        let records = entry.get_mut();

        let before = records.len();
        records.retain(|record| !filter.matches(record));
        let removed = before - records.len();

        log::debug!("Deleted {} record(s) from {}", removed, collection);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};
    use serde_json::json;

    fn shape() -> CollectionShape {
        CollectionShape::from_fields(
            "alice_shop_User",
            &[
                Field::new("email", FieldType::String).required().unique(),
                Field::new("name", FieldType::String),
            ],
        )
    }

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryDocumentStore::new();
        let shape = shape();

        let record = store.insert(&shape, doc(json!({"email": "a@x.io", "name": "A"}))).await.unwrap();
        assert!(!record.id.is_empty());
        assert!(record.get("createdAt").is_some());

        let found = store.find_by_id(&shape.name, &record.id).await.unwrap().unwrap();
        assert_eq!(found.get("email"), Some(&json!("a@x.io")));

        let all = store.find(&shape.name, &Filter::new()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation() {
        let store = MemoryDocumentStore::new();
        let shape = shape();

        store.insert(&shape, doc(json!({"email": "a@x.io"}))).await.unwrap();
        let err = store.insert(&shape, doc(json!({"email": "a@x.io"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref field, .. } if field == "email"));
        assert_eq!(store.find(&shape.name, &Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_required_field() {
        let store = MemoryDocumentStore::new();
        let err = store.insert(&shape(), doc(json!({"name": "A"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRequired { .. }));
    }

    #[tokio::test]
    async fn test_strict_shape_drops_unknown_fields() {
        let store = MemoryDocumentStore::new();
        let record = store
            .insert(&shape(), doc(json!({"email": "a@x.io", "role": "admin", "_id": "forged"})))
            .await
            .unwrap();
        assert!(record.get("role").is_none());
        assert_ne!(record.id, "forged");
    }

    #[tokio::test]
    async fn test_permissive_shape_keeps_everything() {
        let store = MemoryDocumentStore::new();
        let shape = CollectionShape::permissive("alice_shop_Anything");
        let record = store.insert(&shape, doc(json!({"role": "admin"}))).await.unwrap();
        assert_eq!(record.get("role"), Some(&json!("admin")));
        assert!(record.get("createdAt").is_none());
    }

    #[tokio::test]
    async fn test_update_one_merges_first_match() {
        let store = MemoryDocumentStore::new();
        let shape = shape();
        store.insert(&shape, doc(json!({"email": "a@x.io", "name": "A"}))).await.unwrap();
        store.insert(&shape, doc(json!({"email": "b@x.io", "name": "A"}))).await.unwrap();

        let mut filter = Filter::new();
        filter.insert("name", json!("A"));
        let updated = store
            .update_one(&shape, &filter, doc(json!({"name": "Z"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("email"), Some(&json!("a@x.io")));
        assert_eq!(updated.get("name"), Some(&json!("Z")));

        let still_a = store.find(&shape.name, &filter).await.unwrap();
        assert_eq!(still_a.len(), 1);
    }

    #[tokio::test]
    async fn test_update_cannot_steal_unique_value() {
        let store = MemoryDocumentStore::new();
        let shape = shape();
        store.insert(&shape, doc(json!({"email": "a@x.io"}))).await.unwrap();
        let b = store.insert(&shape, doc(json!({"email": "b@x.io"}))).await.unwrap();

        let err = store
            .update_one(&shape, &Filter::new().with_id(b.id.clone()), doc(json!({"email": "a@x.io"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        // Re-writing its own value is fine
        let same = store
            .update_one(&shape, &Filter::new().with_id(b.id), doc(json!({"email": "b@x.io"})))
            .await
            .unwrap();
        assert!(same.is_some());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryDocumentStore::new();
        let shape = shape();
        store.insert(&shape, doc(json!({"email": "a@x.io", "name": "A"}))).await.unwrap();
        store.insert(&shape, doc(json!({"email": "b@x.io", "name": "A"}))).await.unwrap();
        store.insert(&shape, doc(json!({"email": "c@x.io", "name": "C"}))).await.unwrap();

        let mut filter = Filter::new();
        filter.insert("name", json!("A"));
        assert_eq!(store.delete_many(&shape.name, &filter).await.unwrap(), 2);
        assert_eq!(store.find(&shape.name, &Filter::new()).await.unwrap().len(), 1);
        assert_eq!(store.delete_many("missing", &filter).await.unwrap(), 0);
    }
}
