//! Operator tokens — the per-request credential for the console API.
//!
//! DESIGN
//! ======
//! The console holds one backend session, so the backend's access token is
//! never handed to HTTP callers. Instead a successful sign-in issues an opaque
//! operator token bound to the signed-in user id. Privileged routes accept a
//! request only when it carries that token and the same user is still the
//! current session. Sign-out, expiry, or a sign-in as someone else makes the
//! token worthless.

use std::sync::Mutex;

use tracing::{debug, info};
use uuid::Uuid;

struct Grant {
    token: String,
    user_id: String,
}

/// Holder of the single live operator token.
#[derive(Default)]
pub struct OperatorTokens {
    grant: Mutex<Option<Grant>>,
}

impl OperatorTokens {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `user_id`, replacing any previous one.
    pub fn issue(&self, user_id: &str) -> String {
        let token = generate_token();
        if let Ok(mut grant) = self.grant.lock() {
            *grant = Some(Grant { token: token.clone(), user_id: user_id.to_owned() });
        }
        info!(user_id, "operator token issued");
        token
    }

    pub fn revoke(&self) {
        let revoked = self.grant.lock().ok().and_then(|mut grant| grant.take());
        if revoked.is_some() {
            info!("operator token revoked");
        }
    }

    /// The user id behind `token`, if it is the live token and its user is
    /// `current_user`.
    #[must_use]
    pub fn validate(&self, token: &str, current_user: Option<&str>) -> Option<String> {
        let guard = self.grant.lock().ok()?;
        let grant = guard.as_ref()?;
        if grant.token != token {
            debug!("operator token mismatch");
            return None;
        }
        if current_user != Some(grant.user_id.as_str()) {
            debug!(user_id = %grant.user_id, "operator token outlived its session");
            return None;
        }
        Some(grant.user_id.clone())
    }
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
#[path = "operator_test.rs"]
mod tests;
