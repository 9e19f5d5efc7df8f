//! Common test utilities for integration tests
//!
//! Every test runs over the in-memory store, so no external services are
//! needed. The store handle is exposed so OTP flows can read issued codes
//! without an email channel.

use std::sync::Arc;

use agricarbon_backend::{config::AppConfig, routes, state::AppState, store::MemoryStore};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@agricarbon.io";
pub const ADMIN_PASSWORD: &str = "test-admin-pass";

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Create a test application with a fresh in-memory store and the
    /// default admin bootstrapped.
    pub async fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config.clone());

        state
            .auth
            .bootstrap_admin(&config.admin.email, &config.admin.password, &config.admin.name)
            .await
            .expect("admin bootstrap");

        let app = routes::create_router(state);
        Self { app, store }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::builder().method("GET").uri(path), None).await
    }

    /// Make a GET request with a bearer token
    pub async fn get_auth(&self, path: &str, token: &str) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(path)
                .header("Authorization", format!("Bearer {token}")),
            None,
        )
        .await
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(Request::builder().method("POST").uri(path), Some(body)).await
    }

    /// Make a PUT request with a bearer token and a JSON body
    pub async fn put_auth(
        &self,
        path: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(path)
                .header("Authorization", format!("Bearer {token}")),
            Some(body),
        )
        .await
    }

    async fn send(
        &self,
        builder: axum::http::request::Builder,
        body: Option<&serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = "test-secret-key-for-testing-only-32chars".to_string();
    config.admin.email = ADMIN_EMAIL.to_string();
    config.admin.password = ADMIN_PASSWORD.to_string();
    config
}
