use axum::response::IntoResponse;

use super::*;
use crate::auth::session::SessionProvider;
use crate::auth::store::AuthPhase;
use crate::auth::types::Role;
use crate::state::test_helpers::{signed_in_app, test_app};

fn sign_up_body(password: &str, confirm: &str) -> SignUpBody {
    SignUpBody { email: "new@example.com".into(), password: password.into(), confirm_password: confirm.into() }
}

// =============================================================================
// validate_sign_up
// =============================================================================

#[test]
fn mismatched_passwords_rejected() {
    let err = validate_sign_up(&sign_up_body("secret1", "secret2")).unwrap_err();
    assert_eq!(err, AuthError::InvalidInput("Passwords do not match".into()));
}

#[test]
fn short_password_rejected() {
    let err = validate_sign_up(&sign_up_body("abc", "abc")).unwrap_err();
    assert_eq!(err, AuthError::InvalidInput("Password must be at least 6 characters".into()));
}

#[test]
fn six_characters_is_enough() {
    assert!(validate_sign_up(&sign_up_body("abcdef", "abcdef")).is_ok());
}

#[test]
fn blank_email_rejected() {
    let body = SignUpBody { email: "  ".into(), ..sign_up_body("abcdef", "abcdef") };
    assert!(validate_sign_up(&body).is_err());
}

// =============================================================================
// Handlers
// =============================================================================

#[tokio::test]
async fn sign_in_returns_settled_admin_state() {
    let app = test_app();
    app.sessions.add_account("admin@example.com", "hunter22", "u-admin");
    app.backend.grant("u-admin", "Admin");

    let body = SignInBody { email: " admin@example.com ".into(), password: "hunter22".into() };
    let Json(resp) = sign_in(State(app.state.clone()), Json(body)).await.unwrap();
    assert_eq!(resp.state.phase, AuthPhase::Ready);
    assert!(resp.state.is_admin);
    assert_eq!(resp.delete_mode, DeleteMode::Hard);

    let token = resp.operator_token.expect("sign-in should issue an operator token");
    assert_eq!(app.state.operators.validate(&token, Some("u-admin")), Some("u-admin".to_string()));
}

#[tokio::test]
async fn signing_in_again_picks_up_new_grant() {
    let app = test_app();
    app.sessions.add_account("owner@example.com", "hunter22", "u1");
    let body = || SignInBody { email: "owner@example.com".into(), password: "hunter22".into() };

    let Json(first) = sign_in(State(app.state.clone()), Json(body())).await.unwrap();
    assert!(!first.state.authorized);

    app.backend.grant("u1", "User");
    let Json(second) = sign_in(State(app.state.clone()), Json(body())).await.unwrap();
    assert!(second.state.authorized);
    assert_eq!(second.state.role, Some(Role::User));
}

#[tokio::test]
async fn bad_credentials_are_bad_request() {
    let app = test_app();
    app.sessions.add_account("a@example.com", "right-one", "u1");

    let body = SignInBody { email: "a@example.com".into(), password: "wrong-one".into() };
    let err = sign_in(State(app.state.clone()), Json(body)).await.unwrap_err();
    assert_eq!(err.0, AuthError::InvalidInput("Invalid login credentials".into()));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    assert!(app.sessions.current_session().is_none());
}

#[tokio::test]
async fn sign_up_points_to_signin_when_confirmation_pending() {
    let app = test_app();
    let (status, Json(resp)) = sign_up(State(app.state.clone()), Json(sign_up_body("abcdef", "abcdef")))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(!resp.signed_in);
    assert_eq!(resp.next, "/signin");
    assert_eq!(resp.user.email.as_deref(), Some("new@example.com"));
    assert!(resp.operator_token.is_none());
}

#[tokio::test]
async fn sign_up_validation_happens_before_provider_call() {
    let app = test_app();
    let err = sign_up(State(app.state.clone()), Json(sign_up_body("abcdef", "abcdeg")))
        .await
        .unwrap_err();
    assert!(matches!(err.0, AuthError::InvalidInput(_)));
    // No account was created, so signing in with it fails.
    assert!(app.sessions.sign_in_with_password("new@example.com", "abcdef").await.is_err());
}

#[tokio::test]
async fn sign_out_is_no_content_even_when_remote_fails() {
    let app = signed_in_app("u1", Role::User).await;
    app.sessions.fail_sign_out_with(AuthError::Transport("down".into()));

    let token = app.state.operators.issue("u1");

    let operator = Operator { user_id: "u1".into() };
    assert_eq!(sign_out(State(app.state.clone()), operator).await, StatusCode::NO_CONTENT);
    let state = app.state.auth.state();
    assert!(state.user.is_none());
    assert!(!state.authorized);
    assert!(app.state.operators.validate(&token, Some("u1")).is_none());
}

#[tokio::test]
async fn refresh_picks_up_revoked_access() {
    let app = signed_in_app("u1", Role::User).await;
    app.backend.answer("u1", Ok(Vec::new()));

    let Json(resp) = refresh(State(app.state.clone()), Operator { user_id: "u1".into() }).await;
    assert!(!resp.state.authorized);
    assert_eq!(resp.state.role, Some(Role::Unauthorized));
    assert_eq!(resp.delete_mode, DeleteMode::Soft);
}

#[tokio::test]
async fn state_serializes_flat_with_delete_mode() {
    let app = signed_in_app("u1", Role::User).await;
    let Json(resp) = state(State(app.state.clone())).await;
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["phase"], "ready");
    assert_eq!(json["role"], "User");
    assert_eq!(json["delete_mode"], "soft");
    assert!(json.get("access_token").is_none());
    assert!(json.get("operator_token").is_none());
}
