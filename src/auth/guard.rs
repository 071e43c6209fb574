//! Route guard — maps auth state to a render/wait/redirect decision.
//!
//! The guard never navigates and never fails. Callers get a tagged
//! `GuardDecision` and perform the navigation themselves, in one place.

use serde::{Deserialize, Serialize};

use super::store::AuthState;

/// Text shown while a decision is `Wait`. Protected content must not render.
pub const WAIT_PLACEHOLDER: &str = "Checking authorization...";

const LOCATION_BASE: &str = "http://console.local";

// =============================================================================
// DECISION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectReason {
    Unauthenticated,
    Unauthorized,
    AdminRequired,
}

impl RedirectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::AdminRequired => "admin-required",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unauthenticated" => Some(Self::Unauthenticated),
            "unauthorized" => Some(Self::Unauthorized),
            "admin-required" => Some(Self::AdminRequired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub target: String,
    pub reason: RedirectReason,
    /// Path the user tried to open.
    pub from: Option<String>,
    /// Ask the client for a document navigation instead of a router push.
    pub full_page: bool,
}

impl Redirect {
    /// Target with the reason (and origin) encoded in the query string.
    #[must_use]
    pub fn location(&self) -> String {
        let Ok(mut url) = reqwest::Url::parse(LOCATION_BASE).and_then(|base| base.join(&self.target)) else {
            return format!("{}?type={}", self.target, self.reason.as_str());
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", self.reason.as_str());
            if let Some(from) = &self.from {
                query.append_pair("from", from);
            }
        }
        match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Render,
    Wait,
    Redirect(Redirect),
}

// =============================================================================
// POLICY
// =============================================================================

/// How the admin-required branch navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminRedirect {
    /// Router push, like the other redirects.
    #[default]
    InApp,
    /// Document navigation, for clients that expect the legacy behavior.
    FullPage,
}

/// Access level a path demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Member,
    Admin,
}

/// Landing targets and the protected route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    pub landing_path: String,
    pub signin_path: String,
    pub admin_landing_path: String,
    pub admin_redirect: AdminRedirect,
    pub protected_prefixes: Vec<String>,
    pub admin_prefixes: Vec<String>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            landing_path: "/yourlost".into(),
            signin_path: "/signin".into(),
            admin_landing_path: "/yourlost".into(),
            admin_redirect: AdminRedirect::InApp,
            protected_prefixes: vec!["/dashboard".into(), "/members".into(), "/lot-payment-history".into()],
            admin_prefixes: vec!["/dashboard/authorize".into()],
        }
    }
}

impl GuardPolicy {
    /// Access level for `path`, by segment-aware prefix match.
    #[must_use]
    pub fn access_for(&self, path: &str) -> Access {
        if self.admin_prefixes.iter().any(|p| path_has_prefix(path, p)) {
            Access::Admin
        } else if self.protected_prefixes.iter().any(|p| path_has_prefix(path, p)) {
            Access::Member
        } else {
            Access::Public
        }
    }

    /// Decision for navigating to `path`.
    #[must_use]
    pub fn check(&self, state: &AuthState, path: &str) -> GuardDecision {
        match self.access_for(path) {
            Access::Public => GuardDecision::Render,
            Access::Member => self.decide(state, false, Some(path)),
            Access::Admin => self.decide(state, true, Some(path)),
        }
    }

    /// Core decision table.
    #[must_use]
    pub fn decide(&self, state: &AuthState, require_admin: bool, from: Option<&str>) -> GuardDecision {
        if state.loading {
            return GuardDecision::Wait;
        }

        let redirect = |target: &str, reason: RedirectReason, full_page: bool| {
            GuardDecision::Redirect(Redirect {
                target: target.to_owned(),
                reason,
                from: from.map(str::to_owned),
                full_page,
            })
        };

        if state.user.is_none() {
            return redirect(&self.landing_path, RedirectReason::Unauthenticated, false);
        }
        if !state.authorized {
            return redirect(&self.landing_path, RedirectReason::Unauthorized, false);
        }
        if require_admin && !state.is_admin {
            let full_page = self.admin_redirect == AdminRedirect::FullPage;
            return redirect(&self.admin_landing_path, RedirectReason::AdminRequired, full_page);
        }
        GuardDecision::Render
    }
}

/// `decide` with the default policy.
#[must_use]
pub fn decide(state: &AuthState, require_admin: bool) -> GuardDecision {
    GuardPolicy::default().decide(state, require_admin, None)
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
