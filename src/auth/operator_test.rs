use super::*;

#[test]
fn issued_token_validates_for_its_user() {
    let tokens = OperatorTokens::new();
    let token = tokens.issue("u1");
    assert_eq!(tokens.validate(&token, Some("u1")), Some("u1".to_string()));
}

#[test]
fn unknown_token_is_rejected() {
    let tokens = OperatorTokens::new();
    tokens.issue("u1");
    assert_eq!(tokens.validate("guessed", Some("u1")), None);
}

#[test]
fn token_is_rejected_once_session_changes_user() {
    let tokens = OperatorTokens::new();
    let token = tokens.issue("u1");
    assert_eq!(tokens.validate(&token, Some("u2")), None);
    assert_eq!(tokens.validate(&token, None), None);
}

#[test]
fn reissue_replaces_previous_token() {
    let tokens = OperatorTokens::new();
    let old = tokens.issue("u1");
    let new = tokens.issue("u1");
    assert_ne!(old, new);
    assert_eq!(tokens.validate(&old, Some("u1")), None);
    assert!(tokens.validate(&new, Some("u1")).is_some());
}

#[test]
fn revoke_invalidates_token() {
    let tokens = OperatorTokens::new();
    let token = tokens.issue("u1");
    tokens.revoke();
    assert_eq!(tokens.validate(&token, Some("u1")), None);
}
