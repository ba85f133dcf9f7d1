use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use std::fmt::Write;
use std::path::Path;
use std::time::Instant;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::error_response;
use crate::config::DatabaseConfig;

/// Per-request trace id, stored in request extensions by [`request_logging`].
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 16 hex characters from 8 random bytes.
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().fold(String::with_capacity(16), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// Same cap as axum's default body limit for extractors.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

fn snippet(bytes: &[u8]) -> String {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return "<non-utf8 body>".to_string();
    };
    if text.len() <= MAX_BODY_LOG_CHARS {
        return text.to_string();
    }
    let mut end = MAX_BODY_LOG_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn format_elapsed(elapsed_us: u128) -> String {
    match elapsed_us {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{}ms", us / 1_000),
        us => format!("{:.1}s", us as f64 / 1_000_000.0),
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn status_level(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}

/// Logs every request and response and tags the response with `X-Trace-Id`.
///
/// Write bodies are buffered so they can be logged; one larger than
/// [`MAX_REQUEST_BODY_BYTES`] is answered with 413 before routing. Headers are
/// not logged, so credentials in `Authorization` never reach the log output.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), |pq| pq.to_string());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let mut body_log = String::new();
    if carries_body(&method) {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    trace_id = %trace_id,
                    method = %method,
                    path = %target,
                    error = %e,
                    "Request body rejected"
                );
                let resp = error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &trace_id,
                    "payload_too_large",
                    "413 - Request body too large",
                );
                return with_trace_header(resp, &trace_id);
            }
        };
        if !bytes.is_empty() {
            body_log = snippet(&bytes);
        }
        req = Request::from_parts(parts, Body::from(bytes));
    }

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        path = %target,
        body = %body_log,
        ua = %user_agent,
        "--> request"
    );

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());
    let status = response.status();

    let (parts, body) = response.into_parts();
    let bytes: Bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let response_log = if is_json && !bytes.is_empty() {
        snippet(&bytes)
    } else {
        String::new()
    };

    let status_code = status.as_u16();
    let level = status_level(status);
    if level == Level::ERROR {
        tracing::error!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            body = %response_log,
            "<-- response"
        );
    } else if level == Level::WARN {
        tracing::warn!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            body = %response_log,
            "<-- response"
        );
    } else {
        tracing::info!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            "<-- response"
        );
    }

    with_trace_header(Response::from_parts(parts, Body::from(bytes)), &trace_id)
}

/// Installs the global subscriber.
///
/// Application events go to stdout, filtered by `RUST_LOG` (default
/// `apiserver=info`). SQL statements emitted by `sqlx` and `sea_orm` go to
/// `db.sql_log_file` instead. The returned guard must be held until exit so
/// buffered SQL lines get flushed.
pub fn init_tracing(db: &DatabaseConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apiserver=info"));
    let console = fmt::layer().with_filter(console_filter);

    let (sql_layer, guard) = if db.sql_log_file.is_empty() {
        (None, None)
    } else {
        let path = Path::new(&db.sql_log_file);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let file_name = path.file_name().ok_or_else(|| {
            anyhow::anyhow!("sql_log_file '{}' has no file name", db.sql_log_file)
        })?;

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        let targets = Targets::new()
            .with_target("sqlx", Level::TRACE)
            .with_target("sea_orm", Level::TRACE);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(targets);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(console)
        .with(sql_layer)
        .try_init()?;
    Ok(guard)
}
