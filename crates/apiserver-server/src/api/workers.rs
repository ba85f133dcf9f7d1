use apiserver_common::types::{Worker, WorkerPayload};
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{error_response, storage_error_response, ApiError};
use crate::logging::TraceId;
use crate::state::AppState;

const UPDATED_MESSAGE: &str = "201 - Updated successfully";
const DELETED_MESSAGE: &str = "200 - Deleted Successfully";

/// Decodes a worker body. The content type is not checked.
fn decode_payload(trace_id: &str, body: &Bytes) -> Result<WorkerPayload, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(trace_id, error = %e, "Invalid worker body");
        error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            "bad_request",
            "400 - Bad Request",
        )
    })
}

/// List all live workers
#[utoipa::path(
    get,
    path = "/workers",
    tag = "Workers",
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Every live worker", body = Vec<Worker>),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 500, description = "Database failure", body = ApiError)
    )
)]
async fn list_workers(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.store.list_workers().await {
        Ok(workers) => (StatusCode::OK, Json(workers)).into_response(),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Get one worker by username
#[utoipa::path(
    get,
    path = "/workers/{username}",
    tag = "Workers",
    security(("basic_auth" = [])),
    params(
        ("username" = String, Path, description = "Worker username")
    ),
    responses(
        (status = 200, description = "The worker", body = Worker),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 404, description = "No live worker with this username", body = ApiError)
    )
)]
async fn get_worker(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    match state.store.get_worker(&username).await {
        Ok(worker) => (StatusCode::OK, Json(worker)).into_response(),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Create a worker
#[utoipa::path(
    post,
    path = "/workers",
    tag = "Workers",
    security(("basic_auth" = [])),
    request_body = WorkerPayload,
    responses(
        (status = 201, description = "Worker created", body = Worker),
        (status = 400, description = "Body is not a worker", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 404, description = "Username missing", body = ApiError),
        (status = 409, description = "Username taken, possibly by a deleted worker", body = ApiError)
    )
)]
async fn create_worker(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let payload = match decode_payload(&trace_id, &body) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.store.create_worker(&payload).await {
        Ok(worker) => (StatusCode::CREATED, Json(worker)).into_response(),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Update a worker's profile
///
/// The username in the body must equal the one in the path. Position is not
/// updatable. Answers `201` on success.
#[utoipa::path(
    put,
    path = "/workers/{username}",
    tag = "Workers",
    security(("basic_auth" = [])),
    params(
        ("username" = String, Path, description = "Worker username")
    ),
    request_body = WorkerPayload,
    responses(
        (status = 201, description = "Worker updated", body = String, content_type = "text/plain"),
        (status = 400, description = "Body is not a worker", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 404, description = "No live worker with this username", body = ApiError),
        (status = 405, description = "Body tries to change the username", body = ApiError)
    )
)]
async fn update_worker(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Bytes,
) -> Response {
    // An unknown worker is reported before a malformed body.
    if let Err(e) = state.store.get_worker(&username).await {
        return storage_error_response(&trace_id, &e);
    }
    let payload = match decode_payload(&trace_id, &body) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.store.update_worker(&username, &payload).await {
        Ok(_) => (StatusCode::CREATED, UPDATED_MESSAGE).into_response(),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Soft-delete a worker
#[utoipa::path(
    delete,
    path = "/workers/{username}",
    tag = "Workers",
    security(("basic_auth" = [])),
    params(
        ("username" = String, Path, description = "Worker username")
    ),
    responses(
        (status = 200, description = "Worker deleted", body = String, content_type = "text/plain"),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 404, description = "No live worker with this username", body = ApiError)
    )
)]
async fn delete_worker(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    match state.store.delete_worker(&username).await {
        Ok(()) => (StatusCode::OK, DELETED_MESSAGE).into_response(),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn worker_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_workers, create_worker))
        .routes(routes!(get_worker, update_worker, delete_worker))
}
