//! Authorization backend contract — the row store behind role lookups.

use uuid::Uuid;

use super::types::{
    AddAuthorizationOutcome, AuthError, AuthorizationPatch, AuthorizationRecord, AuthorizationRow, NewAuthorization,
    RegisteredUser,
};

/// Remote authorization lookups and the admin management calls.
/// Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthorizationBackend: Send + Sync {
    /// Look up the authorization rows for a user id. An empty result means
    /// the user has no record.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the lookup cannot be completed.
    async fn resolve_authorization(&self, user_id: &str) -> Result<Vec<AuthorizationRow>, AuthError>;

    /// All authorization records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the rows cannot be fetched.
    async fn list_authorizations(&self) -> Result<Vec<AuthorizationRecord>, AuthError>;

    /// Grant a role to an email address on behalf of `creator_id`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the grant is rejected.
    async fn add_authorization(
        &self,
        grant: &NewAuthorization,
        creator_id: &str,
    ) -> Result<AddAuthorizationOutcome, AuthError>;

    /// Apply a partial update to one record.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the update is rejected.
    async fn update_authorization(&self, id: Uuid, patch: &AuthorizationPatch) -> Result<(), AuthError>;

    /// Remove one record.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the delete is rejected.
    async fn delete_authorization(&self, id: Uuid) -> Result<(), AuthError>;

    /// Accounts known to the identity provider.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the accounts cannot be fetched.
    async fn list_registered_users(&self) -> Result<Vec<RegisteredUser>, AuthError>;
}
