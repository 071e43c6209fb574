//! GoTrue client — password grant, sign-up, token refresh, logout.
//!
//! DESIGN
//! ======
//! `GoTrueClient` is a stateless HTTP wrapper. `SupabaseSessions` owns the
//! live session in a `SessionStore` and implements `SessionProvider` on top
//! of the client. `spawn_token_refresh` keeps that session fresh.
//!
//! ERROR HANDLING
//! ==============
//! A refresh that fails expires the session: listeners see it go absent and
//! drop authorization immediately. Sign-out clears the local session before
//! the remote revocation, so a backend failure never leaves a user signed in.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{build_http, send};
use crate::auth::session::{SessionProvider, SessionStore, SessionSubscription, SignUpOutcome};
use crate::auth::types::{AuthError, Session, SessionUser};
use crate::config::BackendConfig;

/// Floor for the refresh delay, so short-lived tokens cannot spin the worker.
const MIN_REFRESH_DELAY_SECS: u64 = 5;

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

/// Result of a sign-up call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResponse {
    /// The account is usable right away.
    Session(Session),
    /// The account must confirm its email before signing in.
    PendingConfirmation(SessionUser),
}

impl GoTrueClient {
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] when the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, AuthError> {
        Ok(Self {
            http: build_http(config.timeouts)?,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        auth_endpoint(&self.base_url, path)
    }

    fn post(&self, path: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Exchange email + password for a session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the credentials are rejected or the
    /// service is unreachable.
    pub async fn password_grant(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = send(self.post("token?grant_type=password", &self.anon_key).json(&body)).await?;
        parse_session(&text, now_secs())
    }

    /// Trade a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the token is rejected or the service is
    /// unreachable.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let text = send(self.post("token?grant_type=refresh_token", &self.anon_key).json(&body)).await?;
        parse_session(&text, now_secs())
    }

    /// # Errors
    ///
    /// Returns an [`AuthError`] when the account is rejected or the service
    /// is unreachable.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResponse, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = send(self.post("signup", &self.anon_key).json(&body)).await?;
        parse_sign_up(&text, now_secs())
    }

    /// Revoke the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the revocation fails.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        send(self.post("logout", access_token)).await.map(|_| ())
    }
}

fn auth_endpoint(base_url: &str, path: &str) -> String {
    format!("{base_url}/auth/v1/{path}")
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<u64>,
    user: UserPayload,
}

#[derive(Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpPayload {
    Session(TokenResponse),
    User(UserPayload),
}

impl TokenResponse {
    fn into_session(self, now_secs: u64) -> Session {
        Session {
            user: self.user.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.or_else(|| self.expires_in.map(|secs| now_secs.saturating_add(secs))),
        }
    }
}

impl From<UserPayload> for SessionUser {
    fn from(user: UserPayload) -> Self {
        Self { id: user.id, email: user.email }
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_session(json: &str, now_secs: u64) -> Result<Session, AuthError> {
    let token: TokenResponse = serde_json::from_str(json).map_err(|e| AuthError::BackendParse(e.to_string()))?;
    Ok(token.into_session(now_secs))
}

fn parse_sign_up(json: &str, now_secs: u64) -> Result<SignUpResponse, AuthError> {
    let payload: SignUpPayload = serde_json::from_str(json).map_err(|e| AuthError::BackendParse(e.to_string()))?;
    Ok(match payload {
        SignUpPayload::Session(token) => SignUpResponse::Session(token.into_session(now_secs)),
        SignUpPayload::User(user) => SignUpResponse::PendingConfirmation(user.into()),
    })
}

// =============================================================================
// SESSION PROVIDER
// =============================================================================

/// Session provider backed by GoTrue.
pub struct SupabaseSessions {
    client: GoTrueClient,
    store: SessionStore,
}

impl SupabaseSessions {
    #[must_use]
    pub fn new(client: GoTrueClient) -> Self {
        Self { client, store: SessionStore::new() }
    }

    /// Handle on the live session, for clients that attach its token.
    #[must_use]
    pub fn store(&self) -> SessionStore {
        self.store.clone()
    }

    /// Refresh the current session. On failure the session is expired.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] without a session, otherwise the
    /// refresh failure.
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        let Some(current) = self.store.current() else {
            return Err(AuthError::NotSignedIn);
        };
        let user_id = current.user_id();

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            info!(user_id, "session expired without a refresh token");
            self.store.replace_if_current(user_id, None);
            return Err(AuthError::InvalidInput("session has no refresh token".into()));
        };

        match self.client.refresh(refresh_token).await {
            Ok(session) if session.user_id() == user_id => {
                self.store.replace_if_current(user_id, Some(session));
                Ok(())
            }
            Ok(session) => {
                warn!(user_id, refreshed = %session.user.id, "refresh returned another user; expiring session");
                self.store.replace_if_current(user_id, None);
                Err(AuthError::BackendParse("refresh returned a different user".into()))
            }
            Err(e) => {
                warn!(user_id, error = %e, code = e.error_code(), "session refresh failed; expiring session");
                self.store.replace_if_current(user_id, None);
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionProvider for SupabaseSessions {
    fn current_session(&self) -> Option<Session> {
        self.store.current()
    }

    fn subscribe(&self) -> SessionSubscription {
        self.store.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.client.password_grant(email, password).await?;
        info!(user_id = %session.user.id, "signed in");
        self.store.set(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        match self.client.sign_up(email, password).await? {
            SignUpResponse::Session(session) => {
                info!(user_id = %session.user.id, "signed up and signed in");
                let user = session.user.clone();
                self.store.set(Some(session));
                Ok(SignUpOutcome { user, signed_in: true })
            }
            SignUpResponse::PendingConfirmation(user) => {
                info!(user_id = %user.id, "signed up; email confirmation pending");
                Ok(SignUpOutcome { user, signed_in: false })
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.store.current() else {
            return Ok(());
        };
        self.store.set(None);
        info!(user_id = %session.user.id, "signed out");

        self.client.logout(&session.access_token).await.map_err(|e| {
            warn!(error = %e, code = e.error_code(), "remote logout failed; local session already cleared");
            e
        })
    }
}

// =============================================================================
// REFRESH WORKER
// =============================================================================

/// How long to wait before acting on `session`: refresh shortly before
/// expiry, or expire it on time when it has no refresh token. `None` when
/// the session never expires.
#[must_use]
pub fn refresh_delay(session: &Session, now_secs: u64, margin_secs: u64) -> Option<Duration> {
    let left = session.seconds_until_expiry(now_secs)?;
    if session.refresh_token.is_none() {
        return Some(Duration::from_secs(left));
    }
    Some(Duration::from_secs(left.saturating_sub(margin_secs).max(MIN_REFRESH_DELAY_SECS)))
}

/// Spawn the background token refresh task. Returns a handle for shutdown.
pub fn spawn_token_refresh(sessions: Arc<SupabaseSessions>, margin_secs: u64) -> JoinHandle<()> {
    info!(margin_secs, "session refresh worker configured");
    tokio::spawn(async move {
        let mut subscription = sessions.subscribe();
        loop {
            let delay = subscription
                .current()
                .and_then(|session| refresh_delay(&session, now_secs(), margin_secs));

            let Some(delay) = delay else {
                if subscription.next_change().await.is_err() {
                    break;
                }
                continue;
            };

            tokio::select! {
                changed = subscription.next_change() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => {
                    // Failure already expired the session and was logged.
                    let _ = sessions.refresh_session().await;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
