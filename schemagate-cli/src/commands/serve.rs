use anyhow::{Context, Result};
use schemagate_core::catalog::{CatalogSeed, MemoryCatalog};
use schemagate_core::config::{SchemaGateConfig, DEFAULT_CONFIG_FILE};
use schemagate_core::engine::DynamicEngine;
use schemagate_core::http::{self, DynamicService};
use schemagate_core::logging::init_logging;
use schemagate_core::store::MemoryDocumentStore;
use std::path::Path;
use std::sync::Arc;

/// Resolve the effective configuration: file, then environment, then flags
pub fn load_config(config: Option<&Path>, port: Option<u16>) -> Result<SchemaGateConfig> {
    let mut config = match config {
        // An explicit file must exist
        Some(path) => {
            let mut config = SchemaGateConfig::default();
            config.merge(SchemaGateConfig::from_file(path)?);
            config.apply_env_vars();
            config
        }
        None => SchemaGateConfig::load_from(DEFAULT_CONFIG_FILE)?,
    };

    if let Some(port) = port {
        config.server.port = port;
    }

    config.validate()?;
    Ok(config)
}

/// Build the service for `catalog` with `config` applied
pub async fn build_service(catalog: &Path, config: &SchemaGateConfig) -> Result<DynamicService> {
    let seed = CatalogSeed::from_file(catalog)?;
    let catalog = MemoryCatalog::from_seed(seed).await;
    log::info!(
        "Loaded catalog: {} project(s), {} schema(s)",
        catalog.project_count(),
        catalog.schema_count()
    );

    let engine = DynamicEngine::new(Arc::new(MemoryDocumentStore::new()), config.tokens.issuer())
        .with_hasher(config.hashing.hasher()?)
        .with_cookie_config(config.tokens.cookie_config()?);

    Ok(DynamicService::new(Arc::new(catalog), Arc::new(engine))
        .with_max_body_size(config.server.max_body_size))
}

pub async fn run(catalog: &Path, config: Option<&Path>, port: Option<u16>) -> Result<()> {
    let config = load_config(config, port)?;
    init_logging(&config.logging);
    log::debug!("Effective configuration: {:?}", config);

    let service = build_service(catalog, &config).await?;
    let addr = config.server.bind_address();
    http::serve(service, &addr).await.with_context(|| format!("Server on {} stopped", addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn port_flag_overrides_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(
            &tmp,
            "schemagate.toml",
            "[server]\nport = 9000\n\n[tokens]\nsecret = \"file-secret\"\n",
        );

        let config = load_config(Some(&path), Some(7000)).unwrap();
        assert_eq!(config.server.port, 7000);

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn missing_explicit_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&tmp.path().join("absent.toml")), None).is_err());
    }

    #[tokio::test]
    async fn builds_service_from_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = write_file(
            &tmp,
            "catalog.json",
            &serde_json::json!({
                "projects": [{"_id": "p1", "project_name": "shop", "user_name": "alice"}],
                "schemas": [{
                    "_id": "s1",
                    "schema_name": "Item",
                    "project_id": "p1",
                    "fields": [{"name": "title", "type": "String"}],
                    "methodsList": [{"method": "READ", "route_name": "all"}]
                }]
            })
            .to_string(),
        );
        let config_path = write_file(&tmp, "schemagate.toml", "[tokens]\nsecret = \"s\"\n");

        let config = load_config(Some(&config_path), None).unwrap();
        let service = build_service(&catalog, &config).await.unwrap();
        assert!(service.engine().registry().is_empty());
    }
}
