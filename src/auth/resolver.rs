//! Authorization resolver — one lookup per call, fail-closed.
//!
//! ERROR HANDLING
//! ==============
//! Any failure (empty id, transport, bad status, unparseable body) yields
//! `Authorization::unauthorized()`. The failure itself rides along in
//! `Resolution::error` so the caller can log it; it never turns into access.
//! No retries: a new lookup happens only when the caller asks again.

use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::AuthorizationBackend;
use super::types::{AuthError, Authorization};

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub authorization: Authorization,
    /// Set when the lookup failed and the result is the fail-closed default.
    pub error: Option<AuthError>,
}

impl Resolution {
    fn granted(authorization: Authorization) -> Self {
        Self { authorization, error: None }
    }

    fn denied(error: AuthError) -> Self {
        Self { authorization: Authorization::unauthorized(), error: Some(error) }
    }
}

#[derive(Clone)]
pub struct AuthorizationResolver {
    backend: Arc<dyn AuthorizationBackend>,
}

impl AuthorizationResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self { backend }
    }

    /// Resolve the authorization for `user_id`.
    pub async fn resolve(&self, user_id: &str) -> Resolution {
        if user_id.trim().is_empty() {
            return Resolution::denied(AuthError::InvalidInput("empty user id".into()));
        }

        let rows = match self.backend.resolve_authorization(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user_id, error = %e, code = e.error_code(), "authorization lookup failed; denying");
                return Resolution::denied(e);
            }
        };

        // More than one row would break the one-active-record rule; any
        // authorized row is enough, the first one wins.
        let authorization = rows
            .into_iter()
            .map(super::types::AuthorizationRow::into_authorization)
            .find(|a| a.authorized)
            .unwrap_or_else(Authorization::unauthorized);

        debug!(user_id, authorized = authorization.authorized, role = %authorization.role, "authorization resolved");
        Resolution::granted(authorization)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
