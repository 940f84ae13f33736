//! Shared fixtures for route tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::app::{create_app, AppState};
use crate::config::Settings;
use crate::db;

/// A fully wired application backed by an in-memory database and a scratch
/// upload directory.
pub struct TestApp {
    pub state: Arc<AppState>,
    router: Router,
    _upload_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Spawn with extra configuration keys on top of the test defaults
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let upload_dir = TempDir::new().unwrap();

        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("DATABASE_URL".into(), "sqlite::memory:".into());
        vars.insert(
            "UPLOAD_DIR".into(),
            upload_dir.path().display().to_string(),
        );
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let pool = db::create_pool(&settings).await.unwrap();
        let state = AppState::new(pool, settings);
        state.storage.ensure_root().await.unwrap();

        Self {
            router: create_app(state.clone()),
            state,
            _upload_dir: upload_dir,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and decode the JSON envelope
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.request(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::PUT, uri, body)).await
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
