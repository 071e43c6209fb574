//! Authorization management routes. Admin only: the caller must present the
//! operator token, and the role check lives in `AuthorizationAdmin`; these
//! handlers only translate HTTP.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use super::auth::Operator;
use crate::auth::admin::AuthorizationListing;
use crate::auth::types::{AuthorizationPatch, NewAuthorization, RegisteredUser};
use crate::state::AppState;

const PENDING_SIGN_UP_NOTICE: &str = "User will be authorized when they sign up with this email.";

#[derive(Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub user_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// `GET /api/authorizations?search=` — newest first, with summary counts.
pub async fn list(
    State(state): State<AppState>,
    _operator: Operator,
    Query(query): Query<ListQuery>,
) -> Result<Json<AuthorizationListing>, ApiError> {
    let auth = state.auth_state().await;
    let listing = state.admin.list(&auth, query.search.as_deref()).await?;
    Ok(Json(listing))
}

/// `POST /api/authorizations` — grant a role to an email.
pub async fn create(
    State(state): State<AppState>,
    _operator: Operator,
    Json(body): Json<NewAuthorization>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    let auth = state.auth_state().await;
    let outcome = state.admin.add(&auth, body).await?;
    let notice = (!outcome.user_found).then_some(PENDING_SIGN_UP_NOTICE);
    Ok((StatusCode::CREATED, Json(CreateResponse { user_found: outcome.user_found, notice })))
}

/// `PATCH /api/authorizations/{id}` — partial update.
pub async fn update(
    State(state): State<AppState>,
    _operator: Operator,
    Path(id): Path<Uuid>,
    Json(body): Json<AuthorizationPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = state.auth_state().await;
    state.admin.update(&auth, id, body).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `DELETE /api/authorizations/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    _operator: Operator,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = state.auth_state().await;
    state.admin.delete(&auth, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/registered-users` — accounts offered when granting access.
pub async fn registered_users(
    State(state): State<AppState>,
    _operator: Operator,
) -> Result<Json<Vec<RegisteredUser>>, ApiError> {
    let auth = state.auth_state().await;
    Ok(Json(state.admin.registered_users(&auth).await?))
}

#[cfg(test)]
#[path = "authorizations_test.rs"]
mod tests;
