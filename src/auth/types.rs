//! Auth types — sessions, roles, authorization records and errors.
//!
//! Shared by the session seam, the resolver, the store, and the HTTP
//! clients. Wire-facing row types mirror the backend's `authorize` table and
//! `get_user_authorization` RPC result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while authenticating, resolving, or managing authorizations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The backend could not be reached (network failure, timeout, DNS).
    #[error("backend unavailable: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("backend responded with status {status}")]
    BackendResponse { status: u16, body: String },

    /// The backend response body could not be deserialized.
    #[error("backend response parse failed: {0}")]
    BackendParse(String),

    /// A valid session exists but no active authorization record covers it.
    #[error("not authorized")]
    NotAuthorized,

    /// The caller is authorized but lacks the Admin role.
    #[error("administrator privileges required")]
    AdminRequired,

    /// The operation needs a session and none is present.
    #[error("not signed in")]
    NotSignedIn,

    /// A caller-supplied value was rejected before any remote call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl AuthError {
    /// Stable machine-readable code for logs and API bodies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::BackendResponse { .. } => "E_BACKEND_RESPONSE",
            Self::BackendParse(_) => "E_BACKEND_PARSE",
            Self::NotAuthorized => "E_NOT_AUTHORIZED",
            Self::AdminRequired => "E_ADMIN_REQUIRED",
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// True for failures of the remote service rather than of the caller.
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::BackendResponse { .. } | Self::BackendParse(_))
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// Application role resolved for a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
    Unauthorized,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
            Self::Unauthorized => "Unauthorized",
        }
    }

    /// Roles that may be stored on an authorization record.
    #[must_use]
    pub fn is_grantable(self) -> bool {
        matches!(self, Self::Admin | Self::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "unauthorized" => Ok(Self::Unauthorized),
            other => Err(AuthError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Identity carried by a session. Safe to expose to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

/// Credential bundle issued by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as Unix seconds, when the provider reports one.
    pub expires_at: Option<u64>,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    #[must_use]
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now_secs)
    }

    /// Seconds left before expiry; `None` when the session never expires.
    #[must_use]
    pub fn seconds_until_expiry(&self, now_secs: u64) -> Option<u64> {
        self.expires_at.map(|exp| exp.saturating_sub(now_secs))
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

/// Resolver output for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Authorization {
    pub authorized: bool,
    pub role: Role,
    pub can_hard_delete: bool,
}

impl Authorization {
    #[must_use]
    pub fn unauthorized() -> Self {
        Self { authorized: false, role: Role::Unauthorized, can_hard_delete: false }
    }
}

/// One row of the `get_user_authorization` RPC result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationRow {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default, alias = "role")]
    pub user_role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub can_hard_delete: Option<bool>,
}

impl AuthorizationRow {
    /// Collapse the row into an [`Authorization`]. Anything short of an
    /// active, authorized row with a grantable role is unauthorized.
    #[must_use]
    pub fn into_authorization(self) -> Authorization {
        if !self.authorized || self.is_active == Some(false) {
            return Authorization::unauthorized();
        }
        let role = match self.user_role.as_deref().map(str::parse::<Role>) {
            Some(Ok(role)) if role.is_grantable() => role,
            _ => return Authorization::unauthorized(),
        };
        let can_hard_delete = self.can_hard_delete.unwrap_or(role == Role::Admin);
        Authorization { authorized: true, role, can_hard_delete }
    }
}

/// Row of the `v_user_authorizations` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Payload for granting a role to an email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthorization {
    pub email: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update of an authorization record. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl AuthorizationPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.role.is_none() && self.is_active.is_none()
    }
}

/// Result of `add_user_authorization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAuthorizationOutcome {
    /// False when the email has no account yet; the grant applies on sign-up.
    #[serde(default)]
    pub user_found: bool,
}

/// Account known to the identity provider, offered when granting access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
}

// =============================================================================
// DELETE POLICY
// =============================================================================

/// How record deletion behaves for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Rows are removed permanently.
    Hard,
    /// Rows are stamped `deleted_at` and can be restored.
    Soft,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
