//! Request body validation against the declared field list

use crate::error::{DynamicError, DynamicResult};
use crate::registry::FieldShape;
use crate::schema::{Location, MethodDefinition, Operation, SchemaDefinition};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Validate `body` for `method` and return the document to write
///
/// Keys must be schema fields or body attributes some restriction of the
/// route reads; anything else is rejected. Values of schema fields must be
/// storable in the field's type. CREATE additionally requires every
/// `isRequired` field. Only schema fields end up in the returned document.
pub fn validate_body(
    body: &Map<String, Value>,
    schema: &SchemaDefinition,
    method: &MethodDefinition,
) -> DynamicResult<Map<String, Value>> {
    let restriction_attributes: HashSet<String> = method
        .restrictions
        .iter()
        .flat_map(|r| r.sources())
        .filter(|source| source.location == Location::Body)
        .map(|source| source.attribute_name)
        .collect();

    let mut document = Map::new();

    for (key, value) in body {
        match schema.field(key) {
            Some(field) => {
                let shape = FieldShape::from_field(field);
                if !shape.accepts(value) {
                    return Err(DynamicError::InvalidBody(format!(
                        "field {} expects {}",
                        key, field.field_type
                    )));
                }
                if field.is_hashed && (value.is_array() || value.is_object()) {
                    return Err(DynamicError::InvalidBody(format!(
                        "hashed field {} expects a scalar value",
                        key
                    )));
                }
                document.insert(key.clone(), value.clone());
            }
            None if restriction_attributes.contains(key) => {}
            None => {
                return Err(DynamicError::InvalidBody(format!("unknown field: {}", key)));
            }
        }
    }

    if method.method == Operation::Create {
        for field in schema.fields.iter().filter(|f| f.is_required) {
            let present = match document.get(&field.name) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(DynamicError::InvalidBody(format!(
                    "missing required field: {}",
                    field.name
                )));
            }
        }
    }

    Ok(document)
}
