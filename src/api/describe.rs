use anyhow::{bail, Result};
use serde_json::Value;

use crate::api::Backend;

/// Machine-readable service description, fetched once from the backend's
/// well-known path. Advisory metadata for tooling and detail views; never
/// consulted when normalizing or validating rows.
pub struct ServiceDescription {
    doc: Value,
}

impl ServiceDescription {
    pub const WELL_KNOWN_PATH: &'static str = "/openapi.json";

    pub async fn fetch(backend: &dyn Backend) -> Result<Self> {
        let doc = backend.get_json(Self::WELL_KNOWN_PATH).await?;
        if !doc.is_object() {
            bail!("service description at {} is not an object", Self::WELL_KNOWN_PATH);
        }
        Ok(Self { doc })
    }

    pub fn from_value(doc: Value) -> Self {
        Self { doc }
    }

    pub fn title(&self) -> Option<&str> {
        self.doc.get("info")?.get("title")?.as_str()
    }

    /// Declared JSON schema of the 200 response for a path/method, if the
    /// description carries one.
    pub fn schema_for(&self, path: &str, method: &str) -> Option<&Value> {
        self.doc
            .get("paths")?
            .get(path)?
            .get(method)?
            .get("responses")?
            .get("200")?
            .get("content")?
            .get("application/json")?
            .get("schema")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "openapi": "3.1.0",
            "info": { "title": "bot service", "version": "0.1.0" },
            "paths": {
                "/bot-runs": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "type": "object" } }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_schema_lookup() {
        let desc = ServiceDescription::from_value(fixture());
        let schema = desc.schema_for("/bot-runs", "get").unwrap();
        assert_eq!(schema["type"], "array");
    }

    #[test]
    fn test_missing_path_or_method() {
        let desc = ServiceDescription::from_value(fixture());
        assert!(desc.schema_for("/unknown", "get").is_none());
        assert!(desc.schema_for("/bot-runs", "post").is_none());
    }

    #[test]
    fn test_title() {
        let desc = ServiceDescription::from_value(fixture());
        assert_eq!(desc.title(), Some("bot service"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_object() {
        let stub = crate::api::StubBackend::new();
        stub.set_get(ServiceDescription::WELL_KNOWN_PATH, json!([1, 2]));
        assert!(ServiceDescription::fetch(&stub).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let stub = crate::api::StubBackend::new();
        stub.set_get(ServiceDescription::WELL_KNOWN_PATH, fixture());
        let desc = ServiceDescription::fetch(&stub).await.unwrap();
        assert!(desc.schema_for("/bot-runs", "get").is_some());
    }
}
