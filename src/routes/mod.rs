//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API for the console front end plus `/console/*`, the one place
//! where guard decisions become HTTP navigations. Privileged routes take the
//! `Operator` extractor. Cross-origin access is off unless one origin is
//! configured. Errors from the auth
//! subsystem map to status codes in `ApiError`; raw backend bodies are
//! logged, never returned.

pub mod auth;
pub mod authorizations;
pub mod console;

use axum::Router;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::types::AuthError;
use crate::state::AppState;

pub fn app(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let router: Router<AppState> = Router::new()
        .route("/api/auth/state", get(auth::state))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/guard", get(console::guard))
        .route("/console/{*path}", get(console::navigate))
        .route("/yourlost", get(console::landing))
        .route(
            "/api/authorizations",
            get(authorizations::list).post(authorizations::create),
        )
        .route(
            "/api/authorizations/{id}",
            patch(authorizations::update).delete(authorizations::delete),
        )
        .route("/api/registered-users", get(authorizations::registered_users))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http());

    let router = match cors_origin {
        Some(origin) => router.layer(cors(origin)),
        None => router,
    };
    router.with_state(state)
}

fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

/// Handler error carrying the underlying [`AuthError`].
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::NotSignedIn => StatusCode::UNAUTHORIZED,
        AuthError::NotAuthorized | AuthError::AdminRequired => StatusCode::FORBIDDEN,
        AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AuthError::BackendResponse { status: 404, .. } => StatusCode::NOT_FOUND,
        AuthError::BackendResponse { status: 409, .. } => StatusCode::CONFLICT,
        AuthError::BackendResponse { status: 401 | 403, .. } => StatusCode::FORBIDDEN,
        AuthError::BackendResponse { status, .. } if (400..500).contains(status) => StatusCode::BAD_REQUEST,
        AuthError::Transport(_) | AuthError::BackendResponse { .. } | AuthError::BackendParse(_) => {
            StatusCode::BAD_GATEWAY
        }
        AuthError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Text safe to show the operator.
pub(crate) fn public_message(err: &AuthError) -> String {
    match err {
        AuthError::Transport(_) | AuthError::BackendParse(_) => "The backend is unavailable. Try again later.".into(),
        AuthError::BackendResponse { status: 404, .. } => "Record not found.".into(),
        AuthError::BackendResponse { .. } => "The backend rejected the request.".into(),
        AuthError::HttpClientBuild(_) => "Internal error.".into(),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = auth_error_to_status(&err);
        match &err {
            AuthError::BackendResponse { status: upstream, body } => {
                tracing::warn!(upstream, body = %body, code = err.error_code(), "backend rejected request");
            }
            e if status.is_server_error() => tracing::error!(error = %e, code = e.error_code(), "request failed"),
            e => tracing::debug!(error = %e, code = e.error_code(), "request refused"),
        }
        let body = ErrorBody { error: err.error_code(), message: public_message(&err) };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
