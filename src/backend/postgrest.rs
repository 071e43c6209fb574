//! PostgREST client — authorization lookups and record management.
//!
//! Every request carries the anon key as `apikey` and the signed-in user's
//! access token as bearer (the anon key when nobody is signed in), so row
//! level security on the backend sees the caller.

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{build_http, send};
use crate::auth::backend::AuthorizationBackend;
use crate::auth::session::SessionStore;
use crate::auth::types::{
    AddAuthorizationOutcome, AuthError, AuthorizationPatch, AuthorizationRecord, AuthorizationRow, NewAuthorization,
    RegisteredUser,
};
use crate::config::BackendConfig;

const AUTHORIZATIONS_VIEW: &str = "v_user_authorizations?select=*&order=created_at.desc";

pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    sessions: SessionStore,
}

impl PostgrestClient {
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] when the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, sessions: SessionStore) -> Result<Self, AuthError> {
        Ok(Self {
            http: build_http(config.timeouts)?,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            sessions,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self.sessions.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, rest_endpoint(&self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn rpc(&self, function: &str, args: &serde_json::Value) -> Result<String, AuthError> {
        send(self.request(Method::POST, &format!("rpc/{function}")).json(args)).await
    }
}

fn rest_endpoint(base_url: &str, path: &str) -> String {
    format!("{base_url}/rest/v1/{path}")
}

fn record_filter(id: Uuid) -> String {
    format!("authorize?id=eq.{id}")
}

#[async_trait::async_trait]
impl AuthorizationBackend for PostgrestClient {
    async fn resolve_authorization(&self, user_id: &str) -> Result<Vec<AuthorizationRow>, AuthError> {
        let text = self
            .rpc("get_user_authorization", &serde_json::json!({ "user_uuid": user_id }))
            .await?;
        parse_rows(&text)
    }

    async fn list_authorizations(&self) -> Result<Vec<AuthorizationRecord>, AuthError> {
        let text = send(self.request(Method::GET, AUTHORIZATIONS_VIEW)).await?;
        parse_rows(&text)
    }

    async fn add_authorization(
        &self,
        grant: &NewAuthorization,
        creator_id: &str,
    ) -> Result<AddAuthorizationOutcome, AuthError> {
        let args = serde_json::json!({
            "user_email": grant.email,
            "user_role": grant.role,
            "is_user_active": grant.is_active,
            "creator_id": creator_id,
        });
        let text = self.rpc("add_user_authorization", &args).await?;
        parse_add_outcome(&text)
    }

    async fn update_authorization(&self, id: Uuid, patch: &AuthorizationPatch) -> Result<(), AuthError> {
        let request = self
            .request(Method::PATCH, &record_filter(id))
            .header("Prefer", "return=representation")
            .json(patch);
        let text = send(request).await?;
        ensure_touched(&text, id)
    }

    async fn delete_authorization(&self, id: Uuid) -> Result<(), AuthError> {
        let request = self
            .request(Method::DELETE, &record_filter(id))
            .header("Prefer", "return=representation");
        let text = send(request).await?;
        ensure_touched(&text, id)
    }

    async fn list_registered_users(&self) -> Result<Vec<RegisteredUser>, AuthError> {
        let text = self.rpc("get_registered_users", &serde_json::json!({})).await?;
        parse_rows(&text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Rows from a table, view, or set-returning RPC. A lone object counts as
/// one row and `null` as none.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
    Null(()),
}

fn parse_rows<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, AuthError> {
    let parsed: OneOrMany<T> = serde_json::from_str(json).map_err(|e| AuthError::BackendParse(e.to_string()))?;
    Ok(match parsed {
        OneOrMany::Many(rows) => rows,
        OneOrMany::One(row) => vec![row],
        OneOrMany::Null(()) => Vec::new(),
    })
}

fn parse_add_outcome(json: &str) -> Result<AddAuthorizationOutcome, AuthError> {
    parse_rows::<AddAuthorizationOutcome>(json)?
        .into_iter()
        .next()
        .ok_or_else(|| AuthError::BackendParse("add_user_authorization returned no result".into()))
}

/// PostgREST answers 200 with an empty list when the filter matched nothing.
fn ensure_touched(json: &str, id: Uuid) -> Result<(), AuthError> {
    let rows: Vec<serde_json::Value> = parse_rows(json)?;
    if rows.is_empty() {
        return Err(AuthError::BackendResponse { status: 404, body: format!("no authorization with id {id}") });
    }
    Ok(())
}

#[cfg(test)]
#[path = "postgrest_test.rs"]
mod tests;
