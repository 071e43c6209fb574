//! Console navigation — the single place guard decisions are acted on.
//!
//! `/api/guard` hands the tagged decision to an in-browser router;
//! `/console/{*path}` performs it server-side (render, wait, or redirect).
//! `/yourlost` explains a redirect.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::auth::guard::{GuardDecision, WAIT_PLACEHOLDER};
use crate::auth::landing::{self, LandingNotice};
use crate::auth::types::{AuthError, Role, SessionUser};
use crate::state::AppState;

/// Seconds a client should wait before retrying a `Wait` decision.
const WAIT_RETRY_SECS: &str = "1";

#[derive(Deserialize)]
pub struct GuardQuery {
    pub path: String,
}

#[derive(Deserialize)]
pub struct LandingQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RenderBody {
    pub path: String,
    pub user: Option<SessionUser>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct WaitBody {
    pub path: String,
    pub message: &'static str,
}

/// `GET /api/guard?path=` — decision JSON for a client-side router.
pub async fn guard(
    State(state): State<AppState>,
    Query(query): Query<GuardQuery>,
) -> Result<Json<GuardDecision>, ApiError> {
    if !query.path.starts_with('/') {
        return Err(AuthError::InvalidInput("path must be absolute".into()).into());
    }
    let auth = state.auth_state().await;
    Ok(Json(state.guard.check(&auth, &query.path)))
}

/// `GET /console/{*path}` — 200 render, 202 wait, 303 redirect.
///
/// A 303 is already a whole-page navigation, so `Redirect::full_page` only
/// changes behavior for `/api/guard` clients; here it is logged.
pub async fn navigate(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let path = format!("/{}", path.trim_start_matches('/'));
    let auth = state.auth_state().await;

    match state.guard.check(&auth, &path) {
        GuardDecision::Render => {
            let body = RenderBody { path, user: auth.user, role: auth.role };
            (StatusCode::OK, Json(body)).into_response()
        }
        GuardDecision::Wait => {
            let mut response = (StatusCode::ACCEPTED, Json(WaitBody { path, message: WAIT_PLACEHOLDER })).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(WAIT_RETRY_SECS));
            response
        }
        GuardDecision::Redirect(redirect) => {
            tracing::info!(
                from = %path,
                target = %redirect.target,
                reason = redirect.reason.as_str(),
                full_page = redirect.full_page,
                "navigation redirected"
            );
            Redirect::to(&redirect.location()).into_response()
        }
    }
}

/// `GET /yourlost?type=&from=` — landing notice.
pub async fn landing(State(state): State<AppState>, Query(query): Query<LandingQuery>) -> Json<LandingNotice> {
    let auth = state.auth_state().await;
    let kind = landing::infer_kind(query.kind.as_deref(), query.from.as_deref(), &auth, &state.guard);
    Json(landing::notice(kind, &auth, &state.guard))
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
