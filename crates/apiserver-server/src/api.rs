pub mod workers;

use apiserver_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::state::AppState;

/// Prefix under which the worker routes are mounted a second time.
pub const APPSCODE_PREFIX: &str = "/appscode";

const WELCOME_MESSAGE: &str = "Congratulations...! Your API Server is up and running... :) ";
const APPSCODE_WELCOME_MESSAGE: &str =
    "Welcome to AppsCode Ltd.. Available Links are : `/appscode/workers`, `/appscode/workers/{username}`";

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Numeric error code, see `to_custom_error_code`
    pub err_code: i32,
    pub err_msg: String,
    /// Same value as the `X-Trace-Id` response header
    pub trace_id: String,
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "not_found" => 1004,
        "conflict" => 1005,
        "method_not_allowed" => 1006,
        "payload_too_large" => 1007,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiError {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
        }),
    )
        .into_response()
}

/// Maps a repository failure to its HTTP status and error body.
pub fn storage_error_response(trace_id: &str, err: &StorageError) -> Response {
    match err {
        StorageError::NotFound { .. } => error_response(
            StatusCode::NOT_FOUND,
            trace_id,
            "not_found",
            "404 - Content Not Found",
        ),
        StorageError::BlankUsername => error_response(
            StatusCode::NOT_FOUND,
            trace_id,
            "not_found",
            "404 - Username must be provided",
        ),
        StorageError::Conflict { .. } => error_response(
            StatusCode::CONFLICT,
            trace_id,
            "conflict",
            "409 - username already exists",
        ),
        StorageError::UsernameChanged { .. } => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            trace_id,
            "method_not_allowed",
            "405 - Username can't be changed",
        ),
        StorageError::Connection(_) | StorageError::Transaction(_) | StorageError::Database(_) => {
            tracing::error!(trace_id, error = %err, "Storage failure");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "internal_error",
                "500 - Internal Server Error",
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Welcome",
    responses(
        (status = 200, description = "Server is up", body = String)
    )
)]
async fn welcome() -> Json<&'static str> {
    Json(WELCOME_MESSAGE)
}

#[utoipa::path(
    get,
    path = "/appscode",
    tag = "Welcome",
    responses(
        (status = 200, description = "Lists the worker links", body = String)
    )
)]
async fn appscode_welcome() -> Json<&'static str> {
    Json(APPSCODE_WELCOME_MESSAGE)
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(welcome))
        .routes(routes!(appscode_welcome))
}
