use crate::api::{self, APPSCODE_PREFIX};
use crate::state::AppState;
use crate::{auth, logging};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use tower_http::timeout::TimeoutLayer;
use utoipa::openapi::OpenApi as OpenApiSpec;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "apiserver API",
        description = "Worker profiles of AppsCode Ltd.",
    ),
    tags(
        (name = "Welcome", description = "Greeting endpoints"),
        (name = "Workers", description = "Worker profile CRUD")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut OpenApiSpec) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "basic_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Basic,
            )),
        );
    }
}

fn openapi_route(spec: Arc<OpenApiSpec>) -> Router {
    Router::new().route(
        "/openapi.json",
        get(move || {
            let spec = spec.clone();
            async move { ([(header::CACHE_CONTROL, "no-cache")], Json(spec.as_ref().clone())) }
        }),
    )
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (worker_router, worker_spec) = api::workers::worker_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(worker_spec);

    let protected = worker_router.layer(middleware::from_fn_with_state(
        state.auth.clone(),
        auth::basic_auth_middleware,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let routed = public_router
        .merge(protected.clone())
        .nest(APPSCODE_PREFIX, protected)
        .with_state(state)
        .merge(openapi_route(Arc::new(merged_spec)))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging));

    // Trailing slashes are trimmed before routing, so `/appscode/` and
    // `/appscode/workers/` hit the same handlers as the bare paths.
    Router::new().fallback_service(NormalizePath::trim_trailing_slash(routed))
}
