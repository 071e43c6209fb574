//! Authorization and session-guard subsystem.
//!
//! SYSTEM CONTEXT
//! ==============
//! Leaf first: `session` (identity provider seam) and `backend` (row store
//! seam) are external collaborators; `resolver` turns a user id into a role;
//! `store` composes both into one reactive `AuthState`; `guard` maps that
//! state to a render/wait/redirect decision; `landing` explains redirects;
//! `admin` manages authorization records for administrators; `operator`
//! issues the per-request credential for privileged routes.

pub mod admin;
pub mod backend;
pub mod guard;
pub mod landing;
pub mod operator;
pub mod resolver;
pub mod session;
pub mod store;
pub mod types;

pub use backend::AuthorizationBackend;
pub use guard::{GuardDecision, GuardPolicy, Redirect, RedirectReason};
pub use operator::OperatorTokens;
pub use resolver::{AuthorizationResolver, Resolution};
pub use session::{SessionProvider, SessionStore, SessionSubscription};
pub use store::{AuthPhase, AuthState, AuthStore};
pub use types::{AuthError, Authorization, Role, Session, SessionUser};

// =============================================================================
// TEST HELPERS
// =============================================================================
