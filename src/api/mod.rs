use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

pub mod describe;
pub mod http;
pub mod retry;

/// Transport seam. Everything above this trait is testable without a
/// network; [`http::HttpBackend`] is the real thing, [`StubBackend`] the
/// test double.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_json(&self, path: &str) -> Result<Value>;
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    async fn get_json(&self, path: &str) -> Result<Value> {
        (**self).get_json(path).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        (**self).post_json(path, body).await
    }
}

/// Thin authenticated client over a [`Backend`].
pub struct ApiClient {
    backend: Box<dyn Backend>,
}

impl ApiClient {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Fetch the record array for a view. A missing or non-array body is an
    /// empty result set, not an error; transport failures still propagate.
    pub async fn load_records(&self, path: &str) -> Result<Vec<Value>> {
        let body = self.backend.get_json(path).await?;
        Ok(match body {
            Value::Array(records) => records,
            _ => Vec::new(),
        })
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.backend.post_json(path, body).await
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

/// RFC 3986 path-segment encoding for identifiers interpolated into
/// action endpoints.
pub fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// In-memory backend for tests: canned GET bodies, recorded POSTs, and an
/// optional forced POST failure.
#[derive(Default)]
pub struct StubBackend {
    gets: Mutex<HashMap<String, Value>>,
    posts: Mutex<Vec<(String, Value)>>,
    post_response: Mutex<Option<Value>>,
    post_error: Mutex<Option<String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_get(&self, path: &str, body: Value) {
        self.gets.lock().unwrap().insert(path.to_string(), body);
    }

    pub fn set_post_response(&self, body: Value) {
        *self.post_response.lock().unwrap() = Some(body);
    }

    pub fn set_post_error(&self, msg: &str) {
        *self.post_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn get_json(&self, path: &str) -> Result<Value> {
        Ok(self
            .gets
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.posts
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        if let Some(msg) = self.post_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        Ok(self
            .post_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| json!({})))
    }
}
