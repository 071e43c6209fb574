//! Hosted backend clients — GoTrue auth and PostgREST rows/RPC.
//!
//! SYSTEM CONTEXT
//! ==============
//! `gotrue` implements the `SessionProvider` seam and keeps the live session;
//! `postgrest` implements `AuthorizationBackend` and reads the session token
//! for every request. Both are thin HTTP wrappers: request building and
//! response parsing are pure functions, tested without a network.

pub mod gotrue;
pub mod postgrest;

use std::time::Duration;

use crate::auth::types::AuthError;
use crate::config::BackendTimeouts;

pub use gotrue::{GoTrueClient, SupabaseSessions, spawn_token_refresh};
pub use postgrest::PostgrestClient;

pub(crate) fn build_http(timeouts: BackendTimeouts) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| AuthError::HttpClientBuild(e.to_string()))
}

/// Send a request and return the body of a 2xx response.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<String, AuthError> {
    let response = request.send().await.map_err(|e| AuthError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| AuthError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(AuthError::BackendResponse { status: status.as_u16(), body: text });
    }
    Ok(text)
}
