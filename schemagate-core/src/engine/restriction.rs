//! Restriction evaluation
//!
//! Two passes guard every dynamic route:
//!
//! 1. [`RestrictionEvaluator::evaluate`] runs before any record of the route's
//!    own collection is read. It checks every `RELEVANT_SCHEMA` restriction by
//!    loading the referenced record from the related collection.
//! 2. [`RestrictionEvaluator::verify_hashed`] runs once candidate records are
//!    fetched. Restrictions on hashed fields cannot be pushed into a filter, so
//!    they are verified against the stored hashes of the candidates.

use crate::engine::query::RECORD_ID_FIELD;
use crate::engine::request::{DynamicRequest, ValueResolver};
use crate::error::{DynamicError, DynamicResult};
use crate::registry::{collection_name, CollectionRegistry};
use crate::schema::{Project, RelevantSchemaRestriction, Restriction, SchemaDefinition, ValueSource};
use crate::security::FieldHasher;
use crate::store::DynamicRecord;
use serde_json::Value;

/// Text form of a request value for hashing or verification
pub(crate) fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Record identifiers arrive as strings or, from loose clients, numbers
fn record_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct RestrictionEvaluator<'a> {
    registry: &'a CollectionRegistry,
    resolver: &'a ValueResolver,
    hasher: &'a FieldHasher,
}

impl<'a> RestrictionEvaluator<'a> {
    pub fn new(
        registry: &'a CollectionRegistry,
        resolver: &'a ValueResolver,
        hasher: &'a FieldHasher,
    ) -> Self {
        Self { registry, resolver, hasher }
    }

    /// Check restrictions in declared order; the first failure aborts
    ///
    /// `SAME_SCHEMA` restrictions are not checked here: plain ones become
    /// filter keys and hashed ones are verified against candidates.
    pub async fn evaluate(
        &self,
        request: &DynamicRequest,
        schema: &SchemaDefinition,
        project: &Project,
        restrictions: &[Restriction],
    ) -> DynamicResult<()> {
        for restriction in restrictions {
            match restriction {
                Restriction::SameSchema(_) => continue,
                Restriction::RelevantSchema(related) => {
                    self.check_related(request, schema, project, related).await?
                }
            }
        }
        Ok(())
    }

    async fn check_related(
        &self,
        request: &DynamicRequest,
        schema: &SchemaDefinition,
        project: &Project,
        restriction: &RelevantSchemaRestriction,
    ) -> DynamicResult<()> {
        let id_value = self.resolver.require(request, &restriction.related_schema_id)?;
        let name = collection_name(
            &project.user_name,
            &project.project_name,
            &restriction.related_schema_name,
        );

        let Some(id) = record_id(&id_value) else {
            return Err(DynamicError::RelatedRecordNotFound(name));
        };

        let related = self.registry.get_or_create_permissive(&name).await;
        let record = related
            .find_by_id(&id)
            .await?
            .ok_or_else(|| DynamicError::RelatedRecordNotFound(name.clone()))?;

        let source = ValueSource::new(restriction.location, restriction.attribute_name.clone());
        let incoming = self.resolver.require(request, &source)?;
        let field = restriction.field_name.as_str();

        let stored = if field == RECORD_ID_FIELD {
            Some(Value::String(record.id.clone()))
        } else {
            record.get(field).cloned()
        };
        let valid = if schema.is_hashed(field) {
            self.verify_one(&incoming, stored.as_ref())
        } else {
            stored.as_ref() == Some(&incoming)
        };

        if !valid {
            log::warn!("Restriction on {}.{} rejected request", name, field);
            return Err(DynamicError::RestrictionValidation(field.to_string()));
        }

        log::debug!("Restriction on {}.{} passed", name, field);
        Ok(())
    }

    fn verify_one(&self, incoming: &Value, stored: Option<&Value>) -> bool {
        match (plain_text(incoming), stored.and_then(Value::as_str)) {
            (Some(plaintext), Some(hash)) => self.hasher.verify(&plaintext, hash),
            _ => false,
        }
    }

    /// Narrow `candidates` to the records every hashed restriction verifies against
    ///
    /// The plaintext is read from the body, falling back to the query string.
    /// Routes without hashed restrictions keep every candidate. Fails when a
    /// plaintext is missing or no candidate survives.
    pub fn verify_hashed(
        &self,
        request: &DynamicRequest,
        schema: &SchemaDefinition,
        restrictions: &[Restriction],
        mut candidates: Vec<DynamicRecord>,
    ) -> DynamicResult<Vec<DynamicRecord>> {
        for restriction in restrictions.iter().filter(|r| schema.is_hashed(r.field_name())) {
            let attribute = restriction.attribute_name();
            let incoming = request
                .body()
                .get(attribute)
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| request.query(attribute).map(|v| Value::String(v.to_string())));

            let Some(incoming) = incoming else {
                log::warn!("No plaintext supplied for hashed field {}", restriction.field_name());
                return Err(DynamicError::RestrictionCheckFailed);
            };

            let field = restriction.field_name();
            let before = candidates.len();
            candidates.retain(|record| self.verify_one(&incoming, record.get(field)));

            if candidates.is_empty() {
                log::warn!("Hashed field {} did not verify against {} candidate(s)", field, before);
                return Err(DynamicError::RestrictionCheckFailed);
            }
        }
        Ok(candidates)
    }
}
