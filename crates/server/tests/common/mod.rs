//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with the mock Odin API and mock job queue injected, so batch, dispatch
//! and watermark endpoints can be exercised without external services.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use odin_jobs_core::{
    load_config_from_str,
    testing::{MockJobQueue, MockOdinApi},
    BatchRouter, DispatchRunner, Dispatcher, JobQueue, OdinApi, SqliteWatermarkStore,
    WatermarkStore,
};
use odin_jobs_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use odin_jobs_core::testing::fixtures;

pub const PROJECT: &str = "ALL-Meso-v3.0.0";

const CONFIG: &str = r#"
[odin]
api_root = "https://odin.test"

[secret]
source = "env"
name = "ODIN_JOBS_TEST_FIXTURE_SECRET"

[queue]
url = "http://queue.test"

[[projects]]
name = "ALL-Meso-v3.0.0"
freqmodes = [13, 24]
"#;

/// Test fixture with an in-process router and controllable mocks.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock Odin API - configure days, scans and failures
    pub api: MockOdinApi,
    /// Mock queue - inspect sent jobs, script failures
    pub queue: MockJobQueue,
    /// Watermark store shared with the router
    pub store: Arc<SqliteWatermarkStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Fixture with dispatch enabled for the fixture project.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Fixture with no dispatch runner, as when no project is configured.
    pub fn without_dispatch() -> Self {
        Self::build(false)
    }

    fn build(with_dispatch: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteWatermarkStore::new(&temp_dir.path().join("test.db"))
                .expect("Failed to create watermark store"),
        );

        let config = load_config_from_str(CONFIG).expect("Fixture config should parse");

        let api = MockOdinApi::new();
        api.set_latest_date(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
        let queue = MockJobQueue::new();

        let runner = with_dispatch.then(|| {
            let dispatcher = Dispatcher::new(
                Arc::new(queue.clone()) as Arc<dyn JobQueue>,
                Arc::clone(&store) as Arc<dyn WatermarkStore>,
                fixtures::encoder(),
            );
            DispatchRunner::new(
                Arc::new(api.clone()) as Arc<dyn OdinApi>,
                Arc::clone(&store) as Arc<dyn WatermarkStore>,
                dispatcher,
                config.projects.clone(),
                config.odin.period_step_days,
            )
        });

        let batch = BatchRouter::new(&config.batch, Some(fixtures::encoder()))
            .expect("Failed to create batch router");

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn WatermarkStore>,
            batch,
            runner,
        ));

        Self {
            router: create_router(state),
            api,
            queue,
            store,
            temp_dir,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
