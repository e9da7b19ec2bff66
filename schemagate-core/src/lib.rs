//! SchemaGate - Core
//!
//! A schema-driven access-control and CRUD engine for tenant-declared data.
//!
//! # Overview
//!
//! A tenant declares a schema (fields), a list of routes (`CREATE`, `READ`,
//! `UPDATE`, `DELETE`) and, per route, restrictions on where the values that
//! guard it come from. SchemaGate serves every declared route generically at
//! `/dynamic/:schemaId/:route` without per-schema code.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use schemagate_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let seed = CatalogSeed::from_file("catalog.json")?;
//!     let catalog = Arc::new(MemoryCatalog::from_seed(seed).await);
//!     let engine = DynamicEngine::new(
//!         Arc::new(MemoryDocumentStore::new()),
//!         TokenIssuer::new(std::env::var("JWT_SECRET")?),
//!     );
//!     let service = DynamicService::new(catalog, Arc::new(engine));
//!     schemagate_core::http::serve(service, "127.0.0.1:8080").await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`schema`] - Stored definitions: fields, routes, restrictions
//! - [`registry`] - Collection handles keyed by owner, project and schema
//! - [`engine`] - Value resolution, restriction checks, filters, CRUD execution
//! - [`security`] - Argon2id hashed fields, HS256 session tokens, cookies
//! - [`store`] - Document store seam and its in-memory implementation
//! - [`catalog`] - Project and schema lookup
//! - [`http`] - hyper service and server loop
//! - [`config`] - TOML + environment configuration

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod logging;
pub mod registry;
pub mod schema;
pub mod security;
pub mod store;

pub use error::{DynamicError, DynamicResult};

/// Commonly used types
pub mod prelude {
    pub use crate::catalog::{CatalogSeed, MemoryCatalog, SchemaCatalog};
    pub use crate::config::SchemaGateConfig;
    pub use crate::engine::{DynamicEngine, DynamicRequest, Outcome};
    pub use crate::error::{DynamicError, DynamicResult};
    pub use crate::http::DynamicService;
    pub use crate::registry::CollectionRegistry;
    pub use crate::schema::{
        Field, FieldType, Location, MethodDefinition, Operation, Project, Restriction,
        SchemaDefinition, ValueSource,
    };
    pub use crate::security::{FieldHasher, TokenIssuer};
    pub use crate::store::{DocumentStore, MemoryDocumentStore};
}
