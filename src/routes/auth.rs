//! Auth routes — sign-in/up/out, state snapshot, manual refresh, and the
//! operator extractor that guards privileged routes.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::auth::store::AuthState;
use crate::auth::types::{AuthError, DeleteMode, SessionUser};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// OPERATOR EXTRACTOR
// =============================================================================

/// Caller holding the live operator token for the signed-in user.
/// Use as a handler parameter to require it.
#[derive(Debug)]
pub struct Operator {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for Operator
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers).ok_or(AuthError::NotSignedIn)?;
        let current = app_state.auth.state();
        let user_id = app_state
            .operators
            .validate(token, current.user_id())
            .ok_or(AuthError::NotSignedIn)?;
        Ok(Self { user_id })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// BODIES
// =============================================================================

/// `AuthState` plus the delete policy it implies.
#[derive(Debug, Serialize)]
pub struct AuthStateResponse {
    #[serde(flatten)]
    pub state: AuthState,
    pub delete_mode: DeleteMode,
    /// Present only in the sign-in response; send it back as a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_token: Option<String>,
}

impl From<AuthState> for AuthStateResponse {
    fn from(state: AuthState) -> Self {
        let delete_mode = state.delete_mode();
        Self { state, delete_mode, operator_token: None }
    }
}

#[derive(Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignUpBody {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user: SessionUser,
    pub signed_in: bool,
    /// Where the front end goes next.
    pub next: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_token: Option<String>,
}

/// Reject a sign-up form before any remote call.
pub(crate) fn validate_sign_up(body: &SignUpBody) -> Result<(), AuthError> {
    if body.email.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email is required".into()));
    }
    if body.password != body.confirm_password {
        return Err(AuthError::InvalidInput("Passwords do not match".into()));
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    Ok(())
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/auth/state` — current snapshot, possibly still loading.
pub async fn state(State(state): State<AppState>) -> Json<AuthStateResponse> {
    Json(state.auth.state().into())
}

/// `POST /api/auth/signin` — password sign-in; returns the settled state and
/// a fresh operator token.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInBody>,
) -> Result<Json<AuthStateResponse>, ApiError> {
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return Err(AuthError::InvalidInput("Email and password are required".into()).into());
    }

    match state.auth.sign_in(email, &body.password).await {
        Ok(settled) => {
            let mut response = AuthStateResponse::from(settled);
            response.operator_token = response.state.user_id().map(|id| state.operators.issue(id));
            Ok(Json(response))
        }
        // GoTrue answers 400 for bad credentials.
        Err(AuthError::BackendResponse { status: 400 | 401, .. }) => {
            Err(AuthError::InvalidInput("Invalid login credentials".into()).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/auth/signup` — create an account.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpBody>,
) -> Result<(StatusCode, Json<SignUpResponse>), ApiError> {
    validate_sign_up(&body)?;

    let outcome = state.auth.sign_up(body.email.trim(), &body.password).await?;
    let next = if outcome.signed_in { "/" } else { state.guard.signin_path.as_str() };
    let operator_token = outcome.signed_in.then(|| state.operators.issue(&outcome.user.id));
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse { user: outcome.user, signed_in: outcome.signed_in, next: next.to_owned(), operator_token }),
    ))
}

/// `POST /api/auth/signout` — always ends the local session.
pub async fn sign_out(State(state): State<AppState>, operator: Operator) -> StatusCode {
    tracing::debug!(user_id = %operator.user_id, "sign-out requested");
    state.operators.revoke();
    if let Err(e) = state.auth.sign_out().await {
        tracing::warn!(error = %e, code = e.error_code(), "sign-out completed locally only");
    }
    StatusCode::NO_CONTENT
}

/// `POST /api/auth/refresh` — re-run the authorization lookup.
pub async fn refresh(State(state): State<AppState>, _operator: Operator) -> Json<AuthStateResponse> {
    Json(state.auth.refresh().await.into())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
