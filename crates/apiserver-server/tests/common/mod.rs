#![allow(dead_code)]

use anyhow::Result;
use apiserver_server::app;
use apiserver_server::config::ServerConfig;
use apiserver_server::state::AppState;
use apiserver_server::worker_seed;
use apiserver_storage::WorkerStore;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const MASUD: (&str, &str) = ("masud", "pass");
pub const ADMIN: (&str, &str) = ("admin", "admin");

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(ServerConfig::default()).await
}

/// Fresh SQLite database seeded with the four default workers.
pub async fn build_test_context_with(mut config: ServerConfig) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("apiserver.db").display()
    );
    config.database.url = Some(url.clone());
    config.database.sql_logging = false;

    let store = WorkerStore::connect(&url, config.database.timezone()?, false).await?;
    store.ensure_schema().await?;
    worker_seed::init_default_workers(&store).await?;

    let state = AppState::new(store, config);
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub fn basic_header((user, pass): (&str, &str)) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub json: Value,
    pub text: String,
    pub trace_id: Option<String>,
    pub www_authenticate: Option<String>,
}

async fn send(app: &axum::Router, req: Request<Body>) -> TestResponse {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let header = |name: &str| {
        resp.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    };
    let trace_id = header("x-trace-id");
    let www_authenticate = header("www-authenticate");

    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let text = String::from_utf8_lossy(&bytes).to_string();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| Value::String(text.clone()))
    };

    TestResponse {
        status,
        json,
        text,
        trace_id,
        www_authenticate,
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<(&str, &str)>,
    body: Value,
) -> TestResponse {
    request_raw(app, method, uri, auth, body.to_string()).await
}

pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<(&str, &str)>,
    body: String,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(creds) = auth {
        builder = builder.header("Authorization", basic_header(creds));
    }
    builder = builder.header("Content-Type", "application/json");
    let req = builder
        .body(Body::from(body))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<(&str, &str)>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(creds) = auth {
        builder = builder.header("Authorization", basic_header(creds));
    }
    let req = builder.body(Body::empty()).expect("request should build");
    send(app, req).await
}

pub fn worker_body(username: &str, city: &str) -> Value {
    serde_json::json!({
        "username": username,
        "firstname": "Masudur",
        "lastname": "Rahman",
        "city": city,
        "division": "Dhaka",
        "position": "Software Engineer",
        "salary": 55
    })
}
