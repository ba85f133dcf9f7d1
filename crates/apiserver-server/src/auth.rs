use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::error_response;
use crate::config::AuthConfig;
use crate::logging::TraceId;

pub const AUTH_REALM: &str = "apiserver";

/// Why a request was refused. The message is returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    #[error("Error: Authorization Needed...!")]
    MissingHeader,
    #[error("Error: Error while decoding...!")]
    Undecodable,
    /// Wrong scheme, or credentials without a `:` separator.
    #[error("Error: Authorization failed...!")]
    Malformed,
    #[error("Error: Unauthorized User...!")]
    UnknownUser,
    #[error("Error: Unauthorized User...!")]
    WrongPassword,
}

/// Identity attached to an authorized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Auth is switched off; nobody was checked.
    Bypassed,
    User(String),
}

/// HTTP basic-auth checker over a fixed, in-memory credential table.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    bypass: bool,
    credentials: HashMap<String, String>,
}

impl BasicAuth {
    pub fn new<I>(bypass: bool, credentials: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            bypass,
            credentials: credentials.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.bypass, config.credentials.clone())
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<Principal, AuthRejection> {
        if self.bypass {
            return Ok(Principal::Bypassed);
        }

        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthRejection::MissingHeader)?;
        if value.is_empty() {
            return Err(AuthRejection::MissingHeader);
        }
        let value = value.to_str().map_err(|_| AuthRejection::Malformed)?;

        let (scheme, encoded) = value.split_once(' ').ok_or(AuthRejection::Malformed)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthRejection::Malformed);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthRejection::Undecodable)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthRejection::Undecodable)?;

        let (user, password) = decoded.split_once(':').ok_or(AuthRejection::Malformed)?;
        match self.credentials.get(user) {
            None => Err(AuthRejection::UnknownUser),
            Some(expected) if expected != password => Err(AuthRejection::WrongPassword),
            Some(_) => Ok(Principal::User(user.to_string())),
        }
    }
}

fn unauthorized(trace_id: &str, rejection: AuthRejection) -> Response {
    let mut resp = error_response(
        StatusCode::UNAUTHORIZED,
        trace_id,
        "unauthorized",
        &rejection.to_string(),
    );
    let challenge = format!("Basic realm=\"{AUTH_REALM}\"");
    if let Ok(val) = HeaderValue::from_str(&challenge) {
        resp.headers_mut().insert(header::WWW_AUTHENTICATE, val);
    }
    resp
}

/// Basic-auth middleware for the worker routes.
pub async fn basic_auth_middleware(
    State(auth): State<Arc<BasicAuth>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    match auth.authorize(req.headers()) {
        Ok(principal) => {
            if let Principal::User(user) = principal {
                tracing::debug!(trace_id = %trace_id, user = %user, "Request authorized");
            }
            next.run(req).await
        }
        Err(rejection) => {
            tracing::warn!(trace_id = %trace_id, reason = ?rejection, "Request rejected by basic auth");
            unauthorized(&trace_id, rejection)
        }
    }
}
