//! Project and schema catalog
//!
//! The dynamic routes only ever read definitions. Authoring them is the job
//! of a management API; the one write the engine exposes is
//! [`SchemaCatalog::replace_methods`], which swaps a schema's route list
//! wholesale.
//!
//! A [`MemoryCatalog`] can be seeded from a JSON document:
//!
//! ```json
//! {
//!   "projects": [{ "_id": "p1", "project_name": "shop", "user_name": "alice" }],
//!   "schemas":  [{ "_id": "s1", "schema_name": "User", "project_id": "p1", "fields": [], "methodsList": [] }]
//! }
//! ```

use crate::schema::{MethodDefinition, Project, SchemaDefinition};
use anyhow::{bail, Context};
use scc::HashMap as SccHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Read access to stored definitions
#[async_trait::async_trait]
pub trait SchemaCatalog: Send + Sync {
    async fn schema(&self, id: &str) -> Option<SchemaDefinition>;

    async fn project(&self, id: &str) -> Option<Project>;

    /// Replace the route list of a schema; false when the schema is unknown
    async fn replace_methods(&self, id: &str, methods: Vec<MethodDefinition>) -> bool;
}

/// Serialized catalog contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub schemas: Vec<SchemaDefinition>,
}

impl CatalogSeed {
    /// Load and validate a seed file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let seed: CatalogSeed = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
        seed.validate()?;
        Ok(seed)
    }

    /// Check referential integrity and uniqueness rules
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut project_ids = HashSet::new();
        for project in &self.projects {
            if !project_ids.insert(project.id.as_str()) {
                bail!("Duplicate project id: {}", project.id);
            }
        }

        let mut schema_ids = HashSet::new();
        let mut schema_names = HashSet::new();
        for schema in &self.schemas {
            if !schema_ids.insert(schema.id.as_str()) {
                bail!("Duplicate schema id: {}", schema.id);
            }
            if !project_ids.contains(schema.project_id.as_str()) {
                bail!("Schema {} references unknown project {}", schema.id, schema.project_id);
            }
            if !schema_names.insert((schema.project_id.as_str(), schema.schema_name.as_str())) {
                bail!(
                    "Schema name {} declared twice in project {}",
                    schema.schema_name,
                    schema.project_id
                );
            }

            let mut routes = HashSet::new();
            for method in &schema.methods_list {
                if !routes.insert((method.route_name.as_str(), method.method)) {
                    bail!(
                        "Route {} declared twice for {} on schema {}",
                        method.route_name,
                        method.method,
                        schema.schema_name
                    );
                }
                if let Err(reason) = method.validate_token() {
                    bail!("Schema {}: {}", schema.schema_name, reason);
                }
            }

            let mut fields = HashSet::new();
            for field in &schema.fields {
                if !fields.insert(field.name.as_str()) {
                    bail!("Field {} declared twice on schema {}", field.name, schema.schema_name);
                }
            }
        }

        Ok(())
    }
}

/// In-process catalog
#[derive(Default)]
pub struct MemoryCatalog {
    projects: SccHashMap<String, Project>,
    schemas: SccHashMap<String, SchemaDefinition>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed(seed: CatalogSeed) -> Self {
        let catalog = Self::new();
        for project in seed.projects {
            catalog.insert_project(project).await;
        }
        for schema in seed.schemas {
            catalog.insert_schema(schema).await;
        }
        catalog
    }

    pub async fn insert_project(&self, project: Project) {
        upsert(&self.projects, project.id.clone(), project).await;
    }

    pub async fn insert_schema(&self, schema: SchemaDefinition) {
        upsert(&self.schemas, schema.id.clone(), schema).await;
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }
}

async fn upsert<V>(map: &SccHashMap<String, V>, key: String, value: V) {
    match map.entry_async(key).await {
        scc::hash_map::Entry::Occupied(mut entry) => *entry.get_mut() = value,
        scc::hash_map::Entry::Vacant(entry) => {
            entry.insert_entry(value);
        }
    }
}

#[async_trait::async_trait]
impl SchemaCatalog for MemoryCatalog {
    async fn schema(&self, id: &str) -> Option<SchemaDefinition> {
        self.schemas.read_async(id, |_, schema| schema.clone()).await
    }

    async fn project(&self, id: &str) -> Option<Project> {
        self.projects.read_async(id, |_, project| project.clone()).await
    }

    async fn replace_methods(&self, id: &str, methods: Vec<MethodDefinition>) -> bool {
        match self.schemas.get_async(id).await {
            Some(mut entry) => {
                entry.get_mut().methods_list = methods;
                true
            }
            None => false,
        }
    }
}
