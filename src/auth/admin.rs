//! Authorization management for administrators.
//!
//! Every operation checks the caller's `AuthState` first and fails closed:
//! a state that is still loading counts as not authorized.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::backend::AuthorizationBackend;
use super::store::AuthState;
use super::types::{
    AddAuthorizationOutcome, AuthError, AuthorizationPatch, AuthorizationRecord, NewAuthorization, RegisteredUser,
    Role,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationSummary {
    pub total: usize,
    pub admins: usize,
    pub users: usize,
    pub active: usize,
    pub inactive: usize,
}

impl AuthorizationSummary {
    #[must_use]
    pub fn of(records: &[AuthorizationRecord]) -> Self {
        let mut summary = Self { total: records.len(), ..Self::default() };
        for r in records {
            match r.role {
                Role::Admin => summary.admins += 1,
                Role::User => summary.users += 1,
                Role::Unauthorized => {}
            }
            if r.is_active {
                summary.active += 1;
            } else {
                summary.inactive += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationListing {
    pub records: Vec<AuthorizationRecord>,
    /// Counts over all records, independent of the search term.
    pub summary: AuthorizationSummary,
}

/// Case-insensitive match on email or role name.
#[must_use]
pub fn matches_search(record: &AuthorizationRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty() || record.email.to_lowercase().contains(&term) || record.role.as_str().to_lowercase().contains(&term)
}

#[derive(Clone)]
pub struct AuthorizationAdmin {
    backend: Arc<dyn AuthorizationBackend>,
}

impl AuthorizationAdmin {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self { backend }
    }

    /// List records, newest first, filtered by `search`.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not an admin or the backend call fails.
    pub async fn list(&self, state: &AuthState, search: Option<&str>) -> Result<AuthorizationListing, AuthError> {
        require_admin(state)?;
        let records = self.backend.list_authorizations().await?;
        let summary = AuthorizationSummary::of(&records);
        let records = match search {
            Some(term) => records.into_iter().filter(|r| matches_search(r, term)).collect(),
            None => records,
        };
        Ok(AuthorizationListing { records, summary })
    }

    /// Grant a role. Unknown emails are pre-authorized for a later sign-up.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not an admin, the grant is invalid, or the
    /// backend rejects it.
    pub async fn add(&self, state: &AuthState, grant: NewAuthorization) -> Result<AddAuthorizationOutcome, AuthError> {
        let admin_id = require_admin(state)?;
        let grant = NewAuthorization { email: validate_email(&grant.email)?, ..grant };
        validate_role(grant.role)?;

        let outcome = self.backend.add_authorization(&grant, admin_id).await?;
        info!(email = %grant.email, role = %grant.role, user_found = outcome.user_found, by = admin_id, "authorization added");
        Ok(outcome)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not an admin, the patch is empty or invalid,
    /// or the backend rejects it.
    pub async fn update(&self, state: &AuthState, id: Uuid, patch: AuthorizationPatch) -> Result<(), AuthError> {
        let admin_id = require_admin(state)?;
        if patch.is_empty() {
            return Err(AuthError::InvalidInput("nothing to update".into()));
        }
        let email = patch.email.as_deref().map(validate_email).transpose()?;
        if let Some(role) = patch.role {
            validate_role(role)?;
        }
        let patch = AuthorizationPatch { email, ..patch };

        self.backend.update_authorization(id, &patch).await?;
        info!(%id, by = admin_id, "authorization updated");
        Ok(())
    }

    /// Remove a record. The user loses dashboard access on their next
    /// resolution.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not an admin or the backend rejects it.
    pub async fn delete(&self, state: &AuthState, id: Uuid) -> Result<(), AuthError> {
        let admin_id = require_admin(state)?;
        self.backend.delete_authorization(id).await?;
        info!(%id, by = admin_id, "authorization deleted");
        Ok(())
    }

    /// Accounts that can be picked when granting access.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not an admin or the backend call fails.
    pub async fn registered_users(&self, state: &AuthState) -> Result<Vec<RegisteredUser>, AuthError> {
        require_admin(state)?;
        self.backend.list_registered_users().await
    }
}

fn require_admin(state: &AuthState) -> Result<&str, AuthError> {
    let Some(user_id) = state.user_id() else {
        return Err(AuthError::NotSignedIn);
    };
    if state.loading || !state.authorized {
        return Err(AuthError::NotAuthorized);
    }
    if !state.is_admin {
        return Err(AuthError::AdminRequired);
    }
    Ok(user_id)
}

fn validate_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if valid { Ok(email.to_owned()) } else { Err(AuthError::InvalidInput(format!("invalid email '{email}'"))) }
}

fn validate_role(role: Role) -> Result<(), AuthError> {
    if role.is_grantable() {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(format!("role '{role}' cannot be granted")))
    }
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
