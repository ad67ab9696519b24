use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::api::Backend;

/// Real transport: JSON over HTTP against the configured backend, with the
/// API key sent as an `X-API-Key` header when one is configured.
pub struct HttpBackend {
    client: Client,
    base: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(base: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-API-Key", key),
            None => req,
        }
    }

    /// Pull the most useful message out of an error body: FastAPI-style
    /// `detail`, generic `message`, else the raw text.
    fn error_message(body: &str) -> String {
        match serde_json::from_str::<Value>(body) {
            Ok(parsed) => parsed
                .get("detail")
                .or_else(|| parsed.get("message"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| body.to_string()),
            Err(_) => body.to_string(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self.with_auth(self.client.get(self.url(path))).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!(
                "GET {} failed: {} - {}",
                path,
                status.as_u16(),
                Self::error_message(&body)
            ));
        }
        // Empty or malformed bodies degrade to null; callers treat that as
        // an empty result set.
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .with_auth(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!(
                "POST {} failed: {} - {}",
                path,
                status.as_u16(),
                Self::error_message(&text)
            ));
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}
