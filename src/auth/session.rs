//! Session seam — the identity provider as seen by the rest of the crate.
//!
//! ARCHITECTURE
//! ============
//! `SessionProvider` is the narrow contract (current session, change
//! notifications, sign-in/up/out). Implementations keep the live session in a
//! `SessionStore`, a `watch` channel whose receivers are the change listeners.
//!
//! TRADE-OFFS
//! ==========
//! `watch` coalesces bursts: a slow listener observes only the newest session,
//! never an intermediate one. Listeners only ever act on the latest identity,
//! so dropped intermediates are harmless.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::types::{AuthError, Session, SessionUser};

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Outcome of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpOutcome {
    pub user: SessionUser,
    /// False when the provider requires email confirmation before sign-in.
    pub signed_in: bool,
}

/// Identity provider contract. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// The session currently held, if any.
    fn current_session(&self) -> Option<Session>;

    /// Register a change listener. Dropping the handle unregisters it.
    fn subscribe(&self) -> SessionSubscription;

    /// Exchange email + password for a session and publish it.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the credentials are rejected or the
    /// provider is unreachable.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the provider rejects the account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError>;

    /// End the current session. The local session is cleared even when the
    /// remote revocation fails.
    ///
    /// # Errors
    ///
    /// Returns the remote failure after the local session has been cleared.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Holder of the live session. Cloning shares the same channel.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.access_token.clone())
    }

    /// Replace the session and notify every listener.
    pub fn set(&self, session: Option<Session>) {
        match &session {
            Some(s) => tracing::debug!(user_id = %s.user.id, "session published"),
            None => tracing::debug!("session cleared"),
        }
        self.tx.send_replace(session);
    }

    /// Replace the session only while `user_id` still holds it. Returns
    /// whether the replacement happened.
    pub fn replace_if_current(&self, user_id: &str, session: Option<Session>) -> bool {
        let replaced = self.tx.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|s| s.user.id == user_id) {
                *slot = session;
                true
            } else {
                false
            }
        });
        if !replaced {
            tracing::debug!(user_id, "session changed meanwhile; replacement skipped");
        }
        replaced
    }

    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription { rx: self.tx.subscribe() }
    }

    /// Number of live listener handles.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// The provider dropped its store; no further changes will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session provider closed")]
pub struct SubscriptionClosed;

/// Scoped session-change listener. Released when dropped.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionSubscription {
    /// Read the latest session and mark it seen.
    pub fn current(&mut self) -> Option<Session> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change and return the session it produced.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionClosed`] once the provider is gone.
    pub async fn next_change(&mut self) -> Result<Option<Session>, SubscriptionClosed> {
        self.rx.changed().await.map_err(|_| SubscriptionClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
