//! Landing notices for users the guard turned away.

use serde::Serialize;

use super::guard::{Access, GuardPolicy, RedirectReason};
use super::store::AuthState;

/// Seconds before the landing page navigates on its own.
pub const AUTO_REDIRECT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LandingKind {
    Unauthenticated,
    Unauthorized,
    AdminRequired,
    NotFound,
}

impl From<RedirectReason> for LandingKind {
    fn from(reason: RedirectReason) -> Self {
        match reason {
            RedirectReason::Unauthenticated => Self::Unauthenticated,
            RedirectReason::Unauthorized => Self::Unauthorized,
            RedirectReason::AdminRequired => Self::AdminRequired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandingAction {
    pub label: &'static str,
    /// `None` for actions that stay on the page (history back, show details).
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoRedirect {
    pub target: String,
    pub after_secs: u64,
}

/// Account facts shown next to access-denied notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDetails {
    pub email: Option<String>,
    pub role: String,
    pub authorized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandingNotice {
    pub kind: LandingKind,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub message: String,
    pub primary: LandingAction,
    pub secondary: LandingAction,
    pub auto_redirect: AutoRedirect,
    pub details: Option<AccountDetails>,
}

/// Pick the notice kind. An explicit reason wins; otherwise a protected
/// origin path is explained from the current state.
#[must_use]
pub fn infer_kind(requested: Option<&str>, from: Option<&str>, state: &AuthState, policy: &GuardPolicy) -> LandingKind {
    if let Some(reason) = requested.and_then(RedirectReason::parse) {
        return reason.into();
    }
    let protected = from.is_some_and(|path| policy.access_for(path) != Access::Public);
    if protected && !state.loading {
        if state.user.is_none() {
            return LandingKind::Unauthenticated;
        }
        if !state.authorized {
            return LandingKind::Unauthorized;
        }
    }
    LandingKind::NotFound
}

#[must_use]
pub fn notice(kind: LandingKind, state: &AuthState, policy: &GuardPolicy) -> LandingNotice {
    let email = state.user.as_ref().and_then(|u| u.email.clone());
    let role = state.role.map_or_else(|| "None".to_owned(), |r| r.to_string());
    let action = |label, target: Option<&str>| LandingAction { label, target: target.map(str::to_owned) };

    let (title, subtitle, message, primary, secondary) = match kind {
        LandingKind::Unauthenticated => (
            "Authentication Required",
            "Please sign in to continue",
            "You need to be signed in to access this page. Sign in with your account to continue to the dashboard."
                .to_owned(),
            action("Sign In", Some(policy.signin_path.as_str())),
            action("Sign Up", Some("/signup")),
        ),
        LandingKind::Unauthorized => (
            "Access Denied",
            "You don't have permission to access this page",
            format!(
                "Your account ({}) is not authorized to access the dashboard. Contact an administrator to request access.",
                email.as_deref().unwrap_or("unknown")
            ),
            action("Go Home", Some("/")),
            action("Contact Admin", None),
        ),
        LandingKind::AdminRequired => (
            "Administrator Access Required",
            "This feature requires admin privileges",
            format!(
                "Your current role ({role}) doesn't have permission to access this feature. Only administrators can access this page."
            ),
            action("Back to Dashboard", Some("/dashboard")),
            action("Contact Admin", None),
        ),
        LandingKind::NotFound => (
            "Page Not Found",
            "The page you're looking for doesn't exist",
            "The page you requested could not be found. It may have been moved, deleted, or you entered the wrong URL."
                .to_owned(),
            action("Go Home", Some("/")),
            action("Go Back", None),
        ),
    };

    let auto_target = if kind == LandingKind::Unauthenticated { policy.signin_path.clone() } else { "/".to_owned() };
    let details = matches!(kind, LandingKind::Unauthorized | LandingKind::AdminRequired).then(|| AccountDetails {
        email: email.clone(),
        role: role.clone(),
        authorized: state.authorized,
    });

    LandingNotice {
        kind,
        title,
        subtitle,
        message,
        primary,
        secondary,
        auto_redirect: AutoRedirect { target: auto_target, after_secs: AUTO_REDIRECT_SECS },
        details,
    }
}

#[cfg(test)]
#[path = "landing_test.rs"]
mod tests;
