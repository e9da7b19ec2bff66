//! Dynamic CRUD execution
//!
//! [`DynamicEngine::execute`] runs one request against a declared schema as a
//! fixed pipeline. Any stage may end the request; nothing is written before
//! every gate has passed.
//!
//! ```text
//! authorize -> validate body -> related restrictions -> build filter
//!     -> fetch candidates -> verify hashed fields -> mutate -> issue token
//! ```
//!
//! | Verb   | Operation | Success |
//! |--------|-----------|---------|
//! | GET    | READ      | 200     |
//! | POST   | CREATE    | 201     |
//! | PUT    | UPDATE    | 200     |
//! | DELETE | DELETE    | 200     |

pub mod body;
pub mod query;
pub mod request;
pub mod response;
pub mod restriction;

pub use query::QueryBuilder;
pub use request::{DynamicRequest, ValueResolver};
pub use response::{Envelope, Outcome};
pub use restriction::RestrictionEvaluator;

use crate::error::{DynamicError, DynamicResult};
use crate::registry::{CollectionHandle, CollectionRegistry};
use crate::schema::{MethodDefinition, Operation, Project, SchemaDefinition};
use crate::security::{CookieConfig, FieldHasher, TokenCookie, TokenIssuer};
use crate::store::{DocumentStore, DynamicRecord, Filter};
use http::StatusCode;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Query parameter addressing a single record
const ID_PARAM: &str = "id";

/// Executes dynamic routes for every schema of every project
pub struct DynamicEngine {
    registry: CollectionRegistry,
    resolver: ValueResolver,
    hasher: FieldHasher,
    tokens: TokenIssuer,
    cookies: TokenCookie,
}

impl DynamicEngine {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenIssuer) -> Self {
        Self {
            registry: CollectionRegistry::new(store),
            resolver: ValueResolver::new(tokens.clone()),
            hasher: FieldHasher::new(),
            tokens,
            cookies: TokenCookie::default(),
        }
    }

    pub fn with_hasher(mut self, hasher: FieldHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookies = TokenCookie::new(config);
        self
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    pub fn hasher(&self) -> &FieldHasher {
        &self.hasher
    }

    /// Run `operation` on `route` of `schema` and shape the outcome
    pub async fn execute(
        &self,
        schema: &SchemaDefinition,
        project: &Project,
        route: &str,
        operation: Operation,
        request: &DynamicRequest,
    ) -> Outcome {
        match self.run(schema, project, route, operation, request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                if !error.status().is_server_error() {
                    log::info!(
                        "{} {}/{} denied: {}",
                        operation,
                        schema.schema_name,
                        route,
                        error
                    );
                }
                Outcome::from(error)
            }
        }
    }

    async fn run(
        &self,
        schema: &SchemaDefinition,
        project: &Project,
        route: &str,
        operation: Operation,
        request: &DynamicRequest,
    ) -> DynamicResult<Outcome> {
        let method = schema
            .find_method(route, operation)
            .ok_or(DynamicError::UnauthorizedOperation)?;
        // Catalog edits bypass seed validation; check before anything is written
        method.validate_token().map_err(DynamicError::Internal)?;

        let document = body::validate_body(request.body(), schema, method)?;

        let handle = self
            .registry
            .get_or_create(&project.user_name, &project.project_name, &schema.schema_name, &schema.fields)
            .await;

        let evaluator = RestrictionEvaluator::new(&self.registry, &self.resolver, &self.hasher);
        evaluator.evaluate(request, schema, project, &method.restrictions).await?;

        let mut filter = QueryBuilder::new(&self.resolver).build_filter(
            request,
            schema,
            handle.shape(),
            &method.restrictions,
        )?;

        let requested_id = request.query(ID_PARAM).filter(|id| !id.is_empty());
        let candidates = match (operation, requested_id) {
            // Single-record fetch by identifier bypasses the filter
            (Operation::Read, Some(id)) => handle.find_by_id(id).await?.into_iter().collect(),
            // Otherwise the identifier narrows the filter
            (Operation::Update | Operation::Delete, Some(id)) => {
                if filter.id().is_some_and(|pinned| pinned != id) {
                    Vec::new()
                } else {
                    filter = filter.with_id(id);
                    handle.find(&filter).await?
                }
            }
            _ => handle.find(&filter).await?,
        };
        log::debug!("{} candidate(s) in {} for {} {}", candidates.len(), handle.name(), operation, route);

        if operation != Operation::Create && candidates.is_empty() {
            return Err(DynamicError::NotFound);
        }

        // Only candidates that pass hashed verification are acted upon
        let authorized = evaluator.verify_hashed(request, schema, &method.restrictions, candidates)?;

        let (status, envelope, operative) = match operation {
            Operation::Create => {
                let record = handle.create(self.hash_fields(schema, document)?).await?;
                log::info!("Created record {} in {}", record.id, handle.name());
                (StatusCode::CREATED, Envelope::data(handle.render(&record)), Some(record))
            }
            Operation::Read => {
                let data = Value::Array(authorized.iter().map(|r| handle.render(r)).collect());
                let operative = single(authorized);
                (StatusCode::OK, Envelope::data(data), operative)
            }
            Operation::Update => {
                let target = authorized.first().map(|r| r.id.clone()).ok_or(DynamicError::NotFound)?;
                let record = self.update(&handle, schema, &filter.with_id(target), document).await?;
                (StatusCode::OK, Envelope::data(handle.render(&record)), Some(record))
            }
            Operation::Delete => {
                let mut removed = 0;
                for record in &authorized {
                    removed += handle.delete_many(&filter.clone().with_id(record.id.clone())).await?;
                }
                log::info!("Deleted {} record(s) from {}", removed, handle.name());
                (StatusCode::OK, Envelope::message("Data deleted successfully"), None)
            }
        };

        let set_cookie = match operative {
            Some(record) if method.send_token => Some(self.token_cookie(method, &record)?),
            _ => None,
        };

        Ok(Outcome::new(status, envelope).with_cookie(set_cookie))
    }

    async fn update(
        &self,
        handle: &CollectionHandle,
        schema: &SchemaDefinition,
        filter: &Filter,
        document: Map<String, Value>,
    ) -> DynamicResult<DynamicRecord> {
        let changes = self.hash_fields(schema, document)?;
        let record = handle.update_one(filter, changes).await?.ok_or(DynamicError::NotFound)?;
        log::info!("Updated record {} in {}", record.id, handle.name());
        Ok(record)
    }

    /// Replace the plaintext of every hashed field with its hash
    fn hash_fields(
        &self,
        schema: &SchemaDefinition,
        mut document: Map<String, Value>,
    ) -> DynamicResult<Map<String, Value>> {
        for field in schema.fields.iter().filter(|f| f.is_hashed) {
            let Some(value) = document.get_mut(&field.name) else {
                continue;
            };
            let Some(plaintext) = restriction::plain_text(value) else {
                continue;
            };
            if plaintext.is_empty() {
                continue;
            }
            *value = Value::String(self.hasher.hash(&plaintext)?);
        }
        Ok(document)
    }

    fn token_cookie(&self, method: &MethodDefinition, record: &DynamicRecord) -> DynamicResult<String> {
        let issued = self.tokens.issue(
            &method.token_name,
            Value::String(record.id.clone()),
            method.expire_in_days,
        )?;
        log::debug!("Issued {} token for record {}", method.token_name, record.id);
        Ok(self.cookies.build_set_cookie(&method.token_name, &issued.token, issued.expires_at))
    }
}

fn single(mut records: Vec<DynamicRecord>) -> Option<DynamicRecord> {
    if records.len() == 1 {
        records.pop()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType, Location, Restriction};
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn engine() -> DynamicEngine {
        DynamicEngine::new(Arc::new(MemoryDocumentStore::new()), TokenIssuer::new("test_secret"))
            .with_hasher(FieldHasher::with_params(1024, 1, 1).unwrap())
    }

    fn project() -> Project {
        Project { id: "p1".into(), project_name: "shop".into(), user_name: "alice".into() }
    }

    fn users() -> SchemaDefinition {
        SchemaDefinition {
            id: "s1".into(),
            schema_name: "User".into(),
            fields: vec![
                Field::new("email", FieldType::String).required().unique(),
                Field::new("password", FieldType::String).hashed(),
            ],
            methods_list: vec![
                MethodDefinition::new(Operation::Create, "signup"),
                MethodDefinition::new(Operation::Read, "login")
                    .with_restriction(Restriction::same_schema(Location::Body, "email", "email"))
                    .with_restriction(Restriction::same_schema(Location::Body, "password", "password"))
                    .with_token("session", 3),
                MethodDefinition::new(Operation::Read, "all"),
                MethodDefinition::new(Operation::Delete, "remove")
                    .with_restriction(Restriction::same_schema(Location::Query, "email", "email")),
            ],
            project_id: "p1".into(),
        }
    }

    fn signup(email: &str, password: &str) -> DynamicRequest {
        DynamicRequest::new()
            .with_body_field("email", json!(email))
            .with_body_field("password", json!(password))
    }

    #[tokio::test]
    async fn test_create_hashes_and_hides() {
        let engine = engine();
        let outcome = engine
            .execute(&users(), &project(), "signup", Operation::Create, &signup("a@x.io", "secret"))
            .await;

        assert_eq!(outcome.status, StatusCode::CREATED);
        let data = outcome.envelope.data.unwrap();
        assert_eq!(data["email"], "a@x.io");
        assert!(data.get("password").is_none());

        let handle = engine.registry().get("alice_shop_User").await.unwrap();
        let stored = handle.find(&Filter::new()).await.unwrap();
        let hash = stored[0].get("password").and_then(Value::as_str).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(engine.hasher().verify("secret", hash));
    }

    #[tokio::test]
    async fn test_undeclared_route_is_forbidden() {
        let engine = engine();
        let outcome = engine
            .execute(&users(), &project(), "signup", Operation::Delete, &DynamicRequest::new())
            .await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.envelope.message.as_deref(), Some("Unauthorized operation"));
    }

    #[tokio::test]
    async fn test_login_issues_cookie_for_single_match() {
        let engine = engine();
        engine
            .execute(&users(), &project(), "signup", Operation::Create, &signup("a@x.io", "secret"))
            .await;

        let outcome = engine
            .execute(&users(), &project(), "login", Operation::Read, &signup("a@x.io", "secret"))
            .await;
        assert_eq!(outcome.status, StatusCode::OK);
        let cookie = outcome.set_cookie.unwrap();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));

        let outcome = engine
            .execute(&users(), &project(), "login", Operation::Read, &signup("a@x.io", "wrong"))
            .await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.envelope.message.as_deref(), Some("Restriction check failed"));
        assert!(outcome.set_cookie.is_none());
    }

    #[tokio::test]
    async fn test_read_without_match_is_not_found() {
        let engine = engine();
        let outcome = engine
            .execute(&users(), &project(), "all", Operation::Read, &DynamicRequest::new())
            .await;
        assert_eq!(outcome.status, StatusCode::NOT_FOUND);
        assert_eq!(outcome.envelope.message.as_deref(), Some("No data found"));
    }

    #[tokio::test]
    async fn test_delete_removes_matches() {
        let engine = engine();
        engine
            .execute(&users(), &project(), "signup", Operation::Create, &signup("a@x.io", "s"))
            .await;
        engine
            .execute(&users(), &project(), "signup", Operation::Create, &signup("b@x.io", "s"))
            .await;

        let outcome = engine
            .execute(
                &users(),
                &project(),
                "remove",
                Operation::Delete,
                &DynamicRequest::new().with_query("email", "a@x.io"),
            )
            .await;
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.envelope.message.as_deref(), Some("Data deleted successfully"));

        let handle = engine.registry().get("alice_shop_User").await.unwrap();
        let left = handle.find(&Filter::new()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].get("email"), Some(&json!("b@x.io")));
    }

    #[tokio::test]
    async fn test_invalid_body_rejected_before_write() {
        let engine = engine();
        let request = signup("a@x.io", "s").with_body_field("role", json!("admin"));
        let outcome =
            engine.execute(&users(), &project(), "signup", Operation::Create, &request).await;
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert!(engine.registry().get("alice_shop_User").await.is_none());
    }

    fn vault() -> SchemaDefinition {
        let pin = || Restriction::same_schema(Location::Body, "pin", "pin");
        SchemaDefinition {
            id: "s2".into(),
            schema_name: "Vault".into(),
            fields: vec![
                Field::new("name", FieldType::String),
                Field::new("pin", FieldType::String).hashed(),
            ],
            methods_list: vec![
                MethodDefinition::new(Operation::Create, "open"),
                MethodDefinition::new(Operation::Create, "add").with_restriction(pin()),
                MethodDefinition::new(Operation::Update, "rename").with_restriction(pin()),
                MethodDefinition::new(Operation::Delete, "close").with_restriction(pin()),
            ],
            project_id: "p1".into(),
        }
    }

    fn vault_body(name: &str, pin: &str) -> DynamicRequest {
        DynamicRequest::new()
            .with_body_field("name", json!(name))
            .with_body_field("pin", json!(pin))
    }

    async fn open_vault(engine: &DynamicEngine, name: &str, pin: &str) -> String {
        let outcome = engine
            .execute(&vault(), &project(), "open", Operation::Create, &vault_body(name, pin))
            .await;
        assert_eq!(outcome.status, StatusCode::CREATED);
        outcome.envelope.data.unwrap()["_id"].as_str().unwrap().to_string()
    }

    async fn vault_record(engine: &DynamicEngine, id: &str) -> Option<DynamicRecord> {
        let handle = engine.registry().get("alice_shop_Vault").await.unwrap();
        handle.find_by_id(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_update_targets_the_verified_record() {
        let engine = engine();
        let a = open_vault(&engine, "A", "aaaa").await;
        let b = open_vault(&engine, "B", "bbbb").await;

        let outcome = engine
            .execute(&vault(), &project(), "rename", Operation::Update, &vault_body("renamed", "bbbb"))
            .await;
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.envelope.data.unwrap()["_id"], b.as_str());

        let first = vault_record(&engine, &a).await.unwrap();
        assert_eq!(first.get("name"), Some(&json!("A")));
        let pin = first.get("pin").and_then(Value::as_str).unwrap();
        assert!(engine.hasher().verify("aaaa", pin));

        let second = vault_record(&engine, &b).await.unwrap();
        assert_eq!(second.get("name"), Some(&json!("renamed")));
    }

    #[tokio::test]
    async fn test_delete_removes_only_verified_records() {
        let engine = engine();
        let a = open_vault(&engine, "A", "aaaa").await;
        let b = open_vault(&engine, "B", "bbbb").await;

        let request = DynamicRequest::new().with_body_field("pin", json!("aaaa"));
        let outcome = engine.execute(&vault(), &project(), "close", Operation::Delete, &request).await;
        assert_eq!(outcome.status, StatusCode::OK);

        assert!(vault_record(&engine, &a).await.is_none());
        assert!(vault_record(&engine, &b).await.is_some());
    }

    #[tokio::test]
    async fn test_create_behind_hashed_restriction_needs_a_verifying_record() {
        let engine = engine();

        let outcome = engine
            .execute(&vault(), &project(), "add", Operation::Create, &vault_body("first", "aaaa"))
            .await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.envelope.message.as_deref(), Some("Restriction check failed"));
        let handle = engine.registry().get("alice_shop_Vault").await.unwrap();
        assert!(handle.find(&Filter::new()).await.unwrap().is_empty());

        open_vault(&engine, "seed", "aaaa").await;

        let outcome = engine
            .execute(&vault(), &project(), "add", Operation::Create, &vault_body("second", "aaaa"))
            .await;
        assert_eq!(outcome.status, StatusCode::CREATED);

        let outcome = engine
            .execute(&vault(), &project(), "add", Operation::Create, &vault_body("third", "zzzz"))
            .await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(handle.find(&Filter::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_token_settings_fail_before_write() {
        let engine = engine();
        let mut schema = users();
        schema.methods_list[0] =
            MethodDefinition::new(Operation::Create, "signup").with_token("session", 1_000_000_000);

        let outcome = engine
            .execute(&schema, &project(), "signup", Operation::Create, &signup("a@x.io", "s"))
            .await;
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outcome.set_cookie.is_none());
        assert!(engine.registry().get("alice_shop_User").await.is_none());
    }

    #[test]
    fn test_single() {
        assert!(single(Vec::new()).is_none());
        assert_eq!(single(vec![DynamicRecord::new("a", Map::new())]).map(|r| r.id), Some("a".into()));
        assert!(single(vec![
            DynamicRecord::new("a", Map::new()),
            DynamicRecord::new("b", Map::new())
        ])
        .is_none());
    }
}
