//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the one process-local `AuthStore` for the console operator, the
//! admin management service, the guard policy, and the operator token that
//! privileged routes require. Handlers never build their own auth state;
//! they read the store.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::admin::AuthorizationAdmin;
use crate::auth::guard::GuardPolicy;
use crate::auth::operator::OperatorTokens;
use crate::auth::store::{AuthState, AuthStore};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthStore>,
    pub admin: AuthorizationAdmin,
    pub guard: Arc<GuardPolicy>,
    pub operators: Arc<OperatorTokens>,
    /// How long a navigation waits for a pending resolution.
    pub guard_wait: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(auth: Arc<AuthStore>, admin: AuthorizationAdmin, guard: GuardPolicy, guard_wait: Duration) -> Self {
        Self { auth, admin, guard: Arc::new(guard), operators: Arc::new(OperatorTokens::new()), guard_wait }
    }

    /// Current auth state, waiting up to `guard_wait` for a pending lookup.
    pub async fn auth_state(&self) -> AuthState {
        self.auth.settled_within(self.guard_wait).await
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
