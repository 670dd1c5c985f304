//! Helpers for driving the router in-process against the scripted provider.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use fitgate_core::auth::SessionManager;
use fitgate_core::testing::ScriptedProvider;
use fitgate_server::router;

/// Password the scripted provider accepts
pub const PASSWORD: &str = "correct-horse";

/// Token written to the seeded token store
pub const SEEDED_TOKEN: &str = "seeded-token";

pub struct Harness {
    // Held so the token store outlives the test
    _dir: TempDir,
    pub manager: Arc<SessionManager<ScriptedProvider>>,
}

impl Harness {
    /// Service whose token store holds a token the provider accepts.
    pub fn seeded() -> Self {
        let harness = Self::empty();
        std::fs::write(harness.manager.token_store(), SEEDED_TOKEN).expect("seed token store");
        harness.provider().accept_token(SEEDED_TOKEN);
        harness
    }

    /// Service with no token store on disk.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens");
        let manager = Arc::new(SessionManager::new(ScriptedProvider::new(PASSWORD), path));
        Self { _dir: dir, manager }
    }

    pub fn provider(&self) -> &ScriptedProvider {
        self.manager.provider()
    }

    pub fn app(&self) -> Router {
        router(Arc::clone(&self.manager))
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        self.send(Method::GET, uri, Body::empty()).await
    }

    pub async fn post(&self, uri: &str, body: &str) -> (u16, Value) {
        self.send(Method::POST, uri, Body::from(body.to_owned())).await
    }

    async fn send(&self, method: Method, uri: &str, body: Body) -> (u16, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .expect("Failed to build request");

        let response = self
            .app()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Failed to deserialize JSON response")
        };
        (status, json)
    }
}
