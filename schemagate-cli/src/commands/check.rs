use anyhow::Result;
use schemagate_core::catalog::CatalogSeed;
use std::fmt::Write;
use std::path::Path;

/// Load and validate `catalog`, returning a printable route summary
pub fn run(catalog: &Path) -> Result<String> {
    let seed = CatalogSeed::from_file(catalog)?;
    Ok(summarize(&seed))
}

fn summarize(seed: &CatalogSeed) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} project(s), {} schema(s)", seed.projects.len(), seed.schemas.len());

    for schema in &seed.schemas {
        let _ = writeln!(out, "\n{} ({})", schema.schema_name, schema.id);
        for method in &schema.methods_list {
            let mut line = format!(
                "  {:<6} /dynamic/{}/{}",
                method.method.http_method(),
                schema.id,
                method.route_name
            );
            if !method.restrictions.is_empty() {
                let _ = write!(line, "  [{} restriction(s)]", method.restrictions.len());
            }
            if method.send_token {
                let _ = write!(line, "  -> {} token, {}d", method.token_name, method.expire_in_days);
            }
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> serde_json::Value {
        serde_json::json!({
            "projects": [{"_id": "p1", "project_name": "shop", "user_name": "alice"}],
            "schemas": [{
                "_id": "s1",
                "schema_name": "User",
                "project_id": "p1",
                "fields": [{"name": "email", "type": "String"}],
                "methodsList": [
                    {"method": "CREATE", "route_name": "signup", "sendToken": true, "tokenName": "session", "expireInDays": 3},
                    {"method": "READ", "route_name": "profile", "restrictions": [
                        {"type": "SAME_SCHEMA", "location": "query", "attribute_name": "email", "field_name": "email"}
                    ]}
                ]
            }]
        })
    }

    #[test]
    fn summary_lists_routes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(&path, seed().to_string()).unwrap();

        let summary = run(&path).unwrap();
        assert!(summary.starts_with("1 project(s), 1 schema(s)"));
        assert!(summary.contains("POST   /dynamic/s1/signup  -> session token, 3d"));
        assert!(summary.contains("GET    /dynamic/s1/profile  [1 restriction(s)]"));
    }

    #[test]
    fn dangling_project_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        let mut seed = seed();
        seed["projects"] = serde_json::json!([]);
        std::fs::write(&path, seed.to_string()).unwrap();

        let err = run(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown project"));
    }
}
