use super::*;
use crate::config::BackendTimeouts;

fn token_json(expires_at: Option<u64>, expires_in: Option<u64>) -> String {
    serde_json::json!({
        "access_token": "at-1",
        "token_type": "bearer",
        "refresh_token": "rt-1",
        "expires_at": expires_at,
        "expires_in": expires_in,
        "user": { "id": "8d0c3b1e", "email": "owner@example.com", "role": "authenticated" }
    })
    .to_string()
}

/// Client pointed at a closed local port, so every call fails fast.
fn unreachable_sessions() -> SupabaseSessions {
    let config = BackendConfig {
        url: "http://127.0.0.1:9".into(),
        anon_key: "anon".into(),
        timeouts: BackendTimeouts { request_secs: 2, connect_secs: 1 },
    };
    SupabaseSessions::new(GoTrueClient::new(&config).unwrap())
}

fn session_with(refresh_token: Option<&str>, expires_at: Option<u64>) -> Session {
    Session {
        user: SessionUser { id: "u1".into(), email: None },
        access_token: "at".into(),
        refresh_token: refresh_token.map(str::to_owned),
        expires_at,
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn parse_session_reads_token_fields() {
    let session = parse_session(&token_json(Some(1_700_003_600), Some(3600)), 1_700_000_000).unwrap();
    assert_eq!(session.user.id, "8d0c3b1e");
    assert_eq!(session.user.email.as_deref(), Some("owner@example.com"));
    assert_eq!(session.access_token, "at-1");
    assert_eq!(session.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(session.expires_at, Some(1_700_003_600));
}

#[test]
fn parse_session_derives_expiry_from_expires_in() {
    let session = parse_session(&token_json(None, Some(3600)), 1_000).unwrap();
    assert_eq!(session.expires_at, Some(4_600));
}

#[test]
fn huge_expires_in_saturates() {
    let session = parse_session(&token_json(None, Some(u64::MAX)), 1_000).unwrap();
    assert_eq!(session.expires_at, Some(u64::MAX));
}

#[test]
fn parse_session_without_user_errors() {
    let err = parse_session(r#"{"access_token":"x"}"#, 0).unwrap_err();
    assert!(matches!(err, AuthError::BackendParse(_)));
}

#[test]
fn parse_sign_up_with_session() {
    let parsed = parse_sign_up(&token_json(None, Some(60)), 0).unwrap();
    assert!(matches!(parsed, SignUpResponse::Session(s) if s.expires_at == Some(60)));
}

#[test]
fn parse_sign_up_pending_confirmation() {
    let json = r#"{"id":"new-user","email":"new@example.com","confirmation_sent_at":"2024-01-01T00:00:00Z"}"#;
    let parsed = parse_sign_up(json, 0).unwrap();
    assert_eq!(
        parsed,
        SignUpResponse::PendingConfirmation(SessionUser { id: "new-user".into(), email: Some("new@example.com".into()) })
    );
}

#[test]
fn auth_endpoint_joins_paths() {
    assert_eq!(
        auth_endpoint("https://x.supabase.co", "token?grant_type=password"),
        "https://x.supabase.co/auth/v1/token?grant_type=password"
    );
}

// =============================================================================
// Refresh scheduling
// =============================================================================

#[test]
fn refresh_delay_subtracts_margin() {
    let session = session_with(Some("rt"), Some(1_000 + 3_600));
    assert_eq!(refresh_delay(&session, 1_000, 60), Some(Duration::from_secs(3_540)));
}

#[test]
fn refresh_delay_is_floored_near_expiry() {
    let session = session_with(Some("rt"), Some(1_010));
    assert_eq!(refresh_delay(&session, 1_000, 60), Some(Duration::from_secs(MIN_REFRESH_DELAY_SECS)));
}

#[test]
fn refresh_delay_none_without_expiry() {
    assert_eq!(refresh_delay(&session_with(Some("rt"), None), 1_000, 60), None);
    assert_eq!(refresh_delay(&session_with(None, None), 1_000, 60), None);
}

#[test]
fn session_without_refresh_token_is_due_at_expiry() {
    assert_eq!(refresh_delay(&session_with(None, Some(5_000)), 1_000, 60), Some(Duration::from_secs(4_000)));
}

// =============================================================================
// Provider behavior
// =============================================================================

#[tokio::test]
async fn sign_out_clears_local_session_even_when_remote_fails() {
    let sessions = unreachable_sessions();
    sessions.store().set(Some(session_with(Some("rt"), None)));

    let err = sessions.sign_out().await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
    assert!(sessions.current_session().is_none());
}

#[tokio::test]
async fn sign_out_without_session_is_noop() {
    let sessions = unreachable_sessions();
    sessions.sign_out().await.unwrap();
}

#[tokio::test]
async fn refresh_without_session_is_not_signed_in() {
    let sessions = unreachable_sessions();
    assert_eq!(sessions.refresh_session().await.unwrap_err(), AuthError::NotSignedIn);
}

#[tokio::test]
async fn refresh_without_refresh_token_expires_session() {
    let sessions = unreachable_sessions();
    sessions.store().set(Some(session_with(None, Some(10))));

    assert!(sessions.refresh_session().await.is_err());
    assert!(sessions.current_session().is_none());
}

#[tokio::test]
async fn failed_refresh_expires_session() {
    let sessions = unreachable_sessions();
    let mut subscription = sessions.subscribe();
    sessions.store().set(Some(session_with(Some("rt"), Some(10))));
    assert!(subscription.current().is_some());

    let err = sessions.refresh_session().await.unwrap_err();
    assert!(err.is_backend_failure());
    let next = tokio::time::timeout(Duration::from_millis(200), subscription.next_change())
        .await
        .expect("expiry should be published")
        .expect("store still open");
    assert!(next.is_none());
}

#[tokio::test]
async fn failed_sign_in_publishes_nothing() {
    let sessions = unreachable_sessions();
    assert!(sessions.sign_in_with_password("a@example.com", "secret").await.is_err());
    assert!(sessions.current_session().is_none());
}
