//! Common test utilities and helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response};
use axum_test::multipart::Part;
use portfolio::db::MemoryDocumentStore;
use portfolio::storage::MemoryObjectStore;
use portfolio::{AppState, Config};
use serde_json::Value;

pub const BUCKET: &str = "portfolio-test";
pub const INTERNAL_SECRET: &str = "internal-test-secret";
pub const OWNER_EMAIL: &str = "owner@example.com";

/// Everything a test needs to drive the app and inspect the backends.
pub struct TestContext {
    pub state: AppState,
    pub documents: Arc<MemoryDocumentStore>,
    pub objects: Arc<MemoryObjectStore>,
}

impl TestContext {
    /// A session token for the operator.
    pub fn token(&self) -> String {
        self.state
            .auth
            .issue_token(OWNER_EMAIL)
            .expect("Failed to issue token")
    }
}

/// Configuration with memory backends and fixed secrets.
pub fn test_config() -> Config {
    let env: HashMap<&str, &str> = HashMap::from([
        ("BASE_URL", "http://localhost:8080"),
        ("GOAUTH_CLIENT_ID", "test-client"),
        ("GOAUTH_CLIENT_SECRET", "test-client-secret"),
        (
            "GOAUTH_REDIRECT_CALLBACK_URL",
            "http://localhost:8080/api/auth/google/callback",
        ),
        ("GOAUTH_REDIRECT_FE_URL", "http://localhost:3000/login"),
        ("JWT_SECRET_KEY", "test-jwt-secret"),
        ("INTERNAL_SECRET", INTERNAL_SECRET),
        ("DATA_BACKEND", "memory"),
    ]);
    Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).expect("Invalid test config")
}

/// Build state over fresh memory backends.
pub fn setup() -> TestContext {
    setup_with(test_config())
}

/// Build state over fresh memory backends with a custom configuration.
pub fn setup_with(config: Config) -> TestContext {
    let documents = Arc::new(MemoryDocumentStore::new());
    let objects = Arc::new(MemoryObjectStore::new(BUCKET));
    let state = AppState::with_backends(config, documents.clone(), objects.clone())
        .expect("Failed to build test state");

    TestContext {
        state,
        documents,
        objects,
    }
}

/// Helper function to create a Bearer Authorization header value
pub fn bearer_auth(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

/// A small PNG part.
pub fn png_part(name: &str) -> Part {
    Part::bytes(b"\x89PNG\r\n\x1a\nfake".to_vec())
        .file_name(format!("{}.png", name))
        .mime_type("image/png")
}

/// A GIF part, which the image rules reject.
pub fn gif_part(name: &str) -> Part {
    Part::bytes(b"GIF89afake".to_vec())
        .file_name(format!("{}.gif", name))
        .mime_type("image/gif")
}

/// Public URL the memory store gives an object.
pub fn object_url(path: &str) -> String {
    format!("https://storage.googleapis.com/{}/{}", BUCKET, path)
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create a request without a body
pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Create a request without a body, authenticated with a Bearer token
pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}
