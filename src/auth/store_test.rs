use super::*;
use crate::auth::test_helpers::{MockBackend, MockSessions, session_for};
use tokio::time::{Duration, sleep, timeout};

fn start(sessions: &Arc<MockSessions>, backend: &Arc<MockBackend>) -> AuthStore {
    AuthStore::start(sessions.clone(), AuthorizationResolver::new(backend.clone()))
}

async fn settled(store: &AuthStore) -> AuthState {
    timeout(Duration::from_secs(2), store.settled())
        .await
        .expect("auth state should settle")
}

// =============================================================================
// AuthState
// =============================================================================

#[test]
fn init_state_is_loading_and_unauthorized() {
    let s = AuthState::init();
    assert_eq!(s.phase, AuthPhase::Init);
    assert!(s.loading);
    assert!(!s.authorized);
    assert!(s.role.is_none());
}

#[test]
fn ready_admin_state_derives_flags() {
    let user = session_for("u1").user;
    let s = AuthState::ready(user, Authorization { authorized: true, role: Role::Admin, can_hard_delete: true });
    assert!(s.is_admin);
    assert!(s.can_hard_delete);
    assert_eq!(s.delete_mode(), DeleteMode::Hard);
}

#[test]
fn ready_unauthorized_state_keeps_user_but_no_access() {
    let user = session_for("u1").user;
    let s = AuthState::ready(user, Authorization::unauthorized());
    assert_eq!(s.user_id(), Some("u1"));
    assert!(!s.authorized);
    assert!(!s.is_admin);
    assert_eq!(s.role, Some(Role::Unauthorized));
    assert_eq!(s.delete_mode(), DeleteMode::Soft);
}

#[test]
fn state_serializes_without_tokens() {
    let json = serde_json::to_value(AuthState::resolving(session_for("u1").user)).unwrap();
    assert_eq!(json["phase"], "resolving");
    assert_eq!(json["loading"], true);
    assert!(!json.to_string().contains("token-u1"));
}

// =============================================================================
// Transitions
// =============================================================================

#[tokio::test]
async fn no_session_settles_anonymous_without_lookup() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);

    let s = settled(&store).await;
    assert_eq!(s.phase, AuthPhase::ReadyAnonymous);
    assert!(!s.authorized);
    assert!(!s.loading);
    assert!(s.role.is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn existing_session_resolves_on_start() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("admin1", "Admin");
    sessions.sign_in_as("admin1");

    let store = start(&sessions, &backend);
    let s = settled(&store).await;
    assert_eq!(s.phase, AuthPhase::Ready);
    assert_eq!(s.role, Some(Role::Admin));
    assert!(s.is_admin);
    assert_eq!(backend.calls(), vec!["admin1".to_string()]);
}

#[tokio::test]
async fn loading_holds_until_lookup_settles() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "User");
    backend.delay("u1", Duration::from_millis(100));
    let store = start(&sessions, &backend);
    settled(&store).await;

    sessions.sign_in_as("u1");
    let mut rx = store.watch();
    let resolving = timeout(Duration::from_secs(1), rx.wait_for(|s| s.phase == AuthPhase::Resolving))
        .await
        .expect("resolving should be published")
        .expect("store alive")
        .clone();
    assert!(resolving.loading);
    assert!(!resolving.authorized);

    let s = settled(&store).await;
    assert_eq!(s.role, Some(Role::User));
}

#[tokio::test]
async fn sign_out_clears_authorization_without_lookup() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);
    assert!(settled(&store).await.is_admin);

    sessions.expire();
    let s = timeout(Duration::from_secs(1), store.wait_until(|s| s.user.is_none()))
        .await
        .unwrap();
    assert_eq!(s.phase, AuthPhase::ReadyAnonymous);
    assert!(!s.authorized);
    assert!(!s.is_admin);
    assert!(!s.can_hard_delete);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn lookup_failure_settles_unauthorized() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.answer("u1", Err(AuthError::Transport("offline".into())));
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);

    let s = settled(&store).await;
    assert_eq!(s.phase, AuthPhase::Ready);
    assert!(!s.authorized);
    assert_eq!(s.user_id(), Some("u1"));
}

#[tokio::test]
async fn token_renewal_for_same_user_skips_lookup() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "User");
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);
    settled(&store).await;

    let mut renewed = session_for("u1");
    renewed.access_token = "token-renewed".into();
    sessions.store.set(Some(renewed));
    sleep(Duration::from_millis(50)).await;

    let s = store.state();
    assert!(!s.loading);
    assert_eq!(s.role, Some(Role::User));
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn repeated_sign_in_for_same_user_resolves_again() {
    let sessions = Arc::new(MockSessions::new());
    sessions.add_account("u1@hoa.test", "pw123456", "u1");
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    settled(&store).await;

    let first = store.sign_in("u1@hoa.test", "pw123456").await.unwrap();
    assert!(!first.authorized);

    backend.grant("u1", "Admin");
    let second = store.sign_in("u1@hoa.test", "pw123456").await.unwrap();
    assert!(second.authorized);
    assert!(second.is_admin);
    assert!(backend.calls().len() >= 2);
}

#[tokio::test]
async fn sign_up_without_session_leaves_state_anonymous() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    settled(&store).await;

    let outcome = store.sign_up("new@hoa.test", "pw123456").await.unwrap();
    assert!(!outcome.signed_in);
    assert_eq!(store.state().phase, AuthPhase::ReadyAnonymous);
    assert!(backend.calls().is_empty());
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn refresh_without_session_is_noop() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    settled(&store).await;

    let s = store.refresh().await;
    assert_eq!(s.phase, AuthPhase::ReadyAnonymous);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn refresh_twice_yields_same_state() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);
    settled(&store).await;

    let first = store.refresh().await;
    let second = store.refresh().await;
    assert_eq!(first, second);
    assert!(first.is_admin);
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test]
async fn refresh_picks_up_revoked_grant() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);
    assert!(settled(&store).await.authorized);

    backend.answer("u1", Ok(Vec::new()));
    let s = store.refresh().await;
    assert!(!s.authorized);
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn late_result_for_previous_user_is_discarded() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    backend.delay("u1", Duration::from_millis(200));
    backend.grant("u2", "User");
    let store = start(&sessions, &backend);
    settled(&store).await;

    sessions.sign_in_as("u1");
    sleep(Duration::from_millis(30)).await;
    sessions.sign_in_as("u2");

    let s = settled(&store).await;
    assert_eq!(s.user_id(), Some("u2"));
    assert_eq!(s.role, Some(Role::User));

    // Past the point where u1's lookup would have finished.
    sleep(Duration::from_millis(300)).await;
    let s = store.state();
    assert_eq!(s.user_id(), Some("u2"));
    assert_eq!(s.role, Some(Role::User));
    assert!(!s.is_admin);
}

#[tokio::test]
async fn sign_out_during_lookup_stays_anonymous() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    backend.delay("u1", Duration::from_millis(150));
    let store = start(&sessions, &backend);
    settled(&store).await;

    sessions.sign_in_as("u1");
    sleep(Duration::from_millis(20)).await;
    sessions.expire();
    sleep(Duration::from_millis(250)).await;

    let s = store.state();
    assert_eq!(s.phase, AuthPhase::ReadyAnonymous);
    assert!(!s.authorized);
}

// =============================================================================
// Sign-in / sign-out through the store
// =============================================================================

#[tokio::test]
async fn sign_in_returns_settled_state_for_new_user() {
    let sessions = Arc::new(MockSessions::new());
    sessions.add_account("admin@hoa.test", "pw123456", "admin1");
    let backend = Arc::new(MockBackend::new());
    backend.grant("admin1", "Admin");
    let store = start(&sessions, &backend);
    settled(&store).await;

    let s = store.sign_in("admin@hoa.test", "pw123456").await.unwrap();
    assert_eq!(s.user_id(), Some("admin1"));
    assert!(s.is_admin);
}

#[tokio::test]
async fn sign_in_with_bad_password_fails() {
    let sessions = Arc::new(MockSessions::new());
    sessions.add_account("a@hoa.test", "right-pw", "u1");
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);

    let err = store.sign_in("a@hoa.test", "wrong-pw").await.unwrap_err();
    assert!(matches!(err, AuthError::BackendResponse { status: 400, .. }));
    assert!(store.sessions().current_session().is_none());
}

#[tokio::test]
async fn sign_out_clears_state_even_when_remote_fails() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "User");
    sessions.sign_in_as("u1");
    let store = start(&sessions, &backend);
    settled(&store).await;

    sessions.fail_sign_out_with(AuthError::Transport("offline".into()));
    let result = store.sign_out().await;
    assert!(result.is_err());
    assert!(store.state().user.is_none());
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn shutdown_releases_subscription() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    settled(&store).await;
    assert_eq!(sessions.store.listener_count(), 1);

    store.shutdown().await;
    assert_eq!(sessions.store.listener_count(), 0);
}

#[tokio::test]
async fn events_after_shutdown_do_not_mutate_state() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    backend.grant("u1", "Admin");
    let store = start(&sessions, &backend);
    let before = settled(&store).await;
    let mut rx = store.watch();
    rx.borrow_and_update();

    store.shutdown().await;
    sessions.sign_in_as("u1");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(store.state(), before);
    assert!(rx.changed().await.is_err(), "state channel should be closed");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn dropping_store_releases_subscription() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    settled(&store).await;

    drop(store);
    timeout(Duration::from_secs(1), async {
        while sessions.store.listener_count() > 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription should be released after drop");
}

#[tokio::test]
async fn refresh_after_shutdown_returns_last_state() {
    let sessions = Arc::new(MockSessions::new());
    let backend = Arc::new(MockBackend::new());
    let store = start(&sessions, &backend);
    let before = settled(&store).await;

    store.shutdown().await;
    assert_eq!(store.refresh().await, before);
}
