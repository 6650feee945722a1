#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] builds the REAL kernel router and state over a fresh
//! [`MemoryForumStore`], so tests are isolated and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use forum_bridge_kernel::models::ContentPolicy;
use forum_bridge_kernel::store::MemoryForumStore;
use forum_bridge_kernel::{AppState, Config, build_router};

/// API key configured for every test app.
pub const TEST_API_KEY: &str = "test-api-key";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryForumStore>,
    pub state: AppState,
}

impl TestApp {
    /// Create a test application with the default test configuration.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a test application with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryForumStore::new(config.content_policy));
        Self::with_store(config, store)
    }

    /// Create a test application over an existing store.
    pub fn with_store(config: Config, store: Arc<MemoryForumStore>) -> Self {
        let state = AppState::new(config, store.clone());
        let router = build_router(state.clone());
        Self {
            router,
            store,
            state,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// POST a report with the test API key.
    pub async fn post_report(&self, body: &Value) -> (StatusCode, Value) {
        self.post_report_with_key(Some(TEST_API_KEY), body.to_string())
            .await
    }

    /// POST a raw report body with an arbitrary key.
    pub async fn post_report_with_key(
        &self,
        key: Option<&str>,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::post("/api/reports").header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        let response = self.request(builder.body(body.into()).unwrap()).await;
        split(response).await
    }

    /// GET a path and decode the JSON body.
    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .request(Request::get(path).body(Body::empty()).unwrap())
            .await;
        split(response).await
    }

    /// Count of users, topics, and posts.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.store.user_count(),
            self.store.topic_count(),
            self.store.post_count(),
        )
    }
}

/// Configuration used by tests: a known key and default limits.
pub fn test_config() -> Config {
    Config {
        report_api_key: TEST_API_KEY.to_string(),
        content_policy: ContentPolicy::default(),
        ..Config::default()
    }
}

/// Split a response into its status and JSON body (`Null` when empty).
pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
