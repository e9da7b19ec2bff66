//! Filter construction from `SAME_SCHEMA` restrictions

use crate::engine::request::{DynamicRequest, ValueResolver};
use crate::error::DynamicResult;
use crate::registry::CollectionShape;
use crate::schema::{Restriction, SchemaDefinition};
use crate::store::Filter;
use serde_json::Value;

/// Restrictions targeting this field pin the record identifier
pub const RECORD_ID_FIELD: &str = "_id";

/// Turns plain same-collection restrictions into a store filter
pub struct QueryBuilder<'a> {
    resolver: &'a ValueResolver,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(resolver: &'a ValueResolver) -> Self {
        Self { resolver }
    }

    /// Equality filter over every non-hashed `SAME_SCHEMA` restriction
    ///
    /// Values are cast to the field's storage type so a query string `"42"`
    /// matches a stored number. A restriction on `_id` pins the identifier.
    /// With no eligible restriction the filter is empty and matches every
    /// record.
    pub fn build_filter(
        &self,
        request: &DynamicRequest,
        schema: &SchemaDefinition,
        shape: &CollectionShape,
        restrictions: &[Restriction],
    ) -> DynamicResult<Filter> {
        let mut filter = Filter::new();

        for restriction in restrictions {
            let Restriction::SameSchema(same) = restriction else {
                continue;
            };
            if schema.is_hashed(&same.field_name) {
                continue;
            }

            let value = self.resolver.require(request, &restriction.source())?;

            if same.field_name == RECORD_ID_FIELD {
                let id = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                filter = filter.with_id(id);
                continue;
            }

            let value = match shape.field(&same.field_name) {
                Some(field) => field.cast(&value),
                None => value,
            };
            filter.insert(same.field_name.clone(), value);
        }

        log::debug!("Built filter with {} key(s) for {}", filter.fields().len(), shape.name);
        Ok(filter)
    }
}
