//! Integration tests for the OAuth flow
//!
//! Drives the protocol client and session orchestrator against a wiremock
//! authorization server: code exchange, refresh rotation, domain
//! enforcement, revocation, and the transient-state lifecycle.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use beacon_auth::{
    AuthConfig, AuthError, AuthSession, ErrorKind, GoogleEndpoints, InMemoryMedium,
    KeyValueMedium, MemoryTokenStore, OAuthClient, TokenManager, OAUTH_STATE_KEY,
    PKCE_VERIFIER_KEY,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT_URI: &str = "http://localhost:8080/callback";

fn mock_endpoints(server: &MockServer) -> GoogleEndpoints {
    GoogleEndpoints {
        authorization: format!("{}/auth", server.uri()),
        token: format!("{}/token", server.uri()),
        userinfo: format!("{}/userinfo", server.uri()),
        revocation: format!("{}/revoke", server.uri()),
    }
}

fn test_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new("test_client_id", Some("test_secret".to_string()), REDIRECT_URI)
        .with_endpoints(mock_endpoints(server))
}

fn client_with_medium(config: AuthConfig) -> (OAuthClient, Arc<InMemoryMedium>) {
    let medium = Arc::new(InMemoryMedium::new());
    let client =
        OAuthClient::new(config, Arc::clone(&medium) as Arc<dyn KeyValueMedium>).unwrap();
    (client, medium)
}

fn token_body(refresh_token: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": make_jwt(3600),
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid profile email",
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = serde_json::Value::String(refresh_token.to_string());
    }
    body
}

fn make_jwt(exp_offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let exp = chrono_now() + exp_offset_secs;
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
    format!("{header}.{body}.signature")
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Build the callback URL the provider would redirect to on success.
fn callback_url(code: &str, state: &str) -> String {
    format!("{REDIRECT_URI}?code={code}&state={state}")
}

/// Validates the full authorization-code callback against a mocked token
/// endpoint.
///
/// # Test Steps
/// 1. Start a login and capture the persisted state nonce and verifier
/// 2. Mock the token endpoint, requiring the PKCE verifier in the form body
/// 3. Handle a callback carrying the matching state and a code
/// 4. Verify the returned token set and that both transient entries are gone
#[tokio::test]
async fn test_callback_exchanges_code_for_tokens() {
    let server = MockServer::start().await;
    let (client, medium) = client_with_medium(test_config(&server));

    client.start_login().unwrap();
    let state = medium.get(OAUTH_STATE_KEY).unwrap().unwrap();
    let verifier = medium.get(PKCE_VERIFIER_KEY).unwrap().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth_code_123"))
        .and(body_string_contains(format!("code_verifier={verifier}")))
        .and(body_string_contains("client_secret=test_secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(Some("refresh_abc"))))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client.handle_callback(&callback_url("auth_code_123", &state)).await.unwrap();

    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh_abc"));
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);

    // Transient entries are single-use and must not survive success.
    assert!(medium.get(PKCE_VERIFIER_KEY).unwrap().is_none());
    assert!(medium.get(OAUTH_STATE_KEY).unwrap().is_none());
}

/// Validates that an invalid state leaves the transient entries in place and
/// never reaches the token endpoint.
///
/// # Test Steps
/// 1. Start a login
/// 2. Mock the token endpoint expecting zero calls
/// 3. Handle a callback with a wrong state value
/// 4. Verify the invalid-state failure and that both entries survive
#[tokio::test]
async fn test_state_mismatch_never_exchanges() {
    let server = MockServer::start().await;
    let (client, medium) = client_with_medium(test_config(&server));

    client.start_login().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(None)))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.handle_callback(&callback_url("auth_code_123", "wrong-state")).await;
    match result {
        Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidState),
        Ok(_) => panic!("state mismatch must fail"),
    }

    assert!(medium.get(PKCE_VERIFIER_KEY).unwrap().is_some());
    assert!(medium.get(OAUTH_STATE_KEY).unwrap().is_some());
}

/// Validates the token-endpoint failure message rules.
///
/// # Test Steps
/// 1. Mock the token endpoint with a JSON OAuth error body
/// 2. Verify the failure message carries the error_description
/// 3. Remount with a non-JSON body
/// 4. Verify the fallback message embeds the HTTP status instead
#[tokio::test]
async fn test_exchange_error_body_fallback() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Code was already redeemed.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.exchange_code_for_tokens("stale_code", "verifier").await;
    match result {
        Err(AuthError::AuthFailed(message)) => {
            assert_eq!(message, "Code was already redeemed.");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }

    server.reset().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>upstream sad</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.exchange_code_for_tokens("any_code", "verifier").await;
    match result {
        Err(AuthError::AuthFailed(message)) => {
            assert!(message.contains("503"), "fallback must embed the status: {message}");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

/// Validates refresh-token rotation semantics.
///
/// # Test Steps
/// 1. Mock a refresh response that omits refresh_token
/// 2. Verify the returned set carries the token passed into the call
/// 3. Remount with a response that reissues a refresh token
/// 4. Verify the reissued token wins
#[tokio::test]
async fn test_refresh_keeps_old_refresh_token() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(None)))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client.refresh_tokens("old_refresh").await.unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some("old_refresh"));

    server.reset().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(Some("rotated_refresh"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client.refresh_tokens("old_refresh").await.unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some("rotated_refresh"));
}

/// Validates that an empty refresh token fails without touching the network.
///
/// # Test Steps
/// 1. Mock the token endpoint expecting zero calls
/// 2. Call refresh with an empty token
/// 3. Verify the token-refresh-failed kind
#[tokio::test]
async fn test_refresh_empty_token_makes_no_request() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(None)))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.refresh_tokens("").await;
    match result {
        Err(e) => assert_eq!(e.kind(), ErrorKind::TokenRefreshFailed),
        Ok(_) => panic!("empty refresh token must fail"),
    }
}

/// Validates refresh failure messaging for a non-2xx response.
///
/// # Test Steps
/// 1. Mock the token endpoint with an invalid_grant error
/// 2. Verify the token-refresh-failed kind and the description message
#[tokio::test]
async fn test_refresh_failure_uses_error_description() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been revoked.",
        })))
        .mount(&server)
        .await;

    let result = client.refresh_tokens("revoked_refresh").await;
    match result {
        Err(AuthError::RefreshFailed(message)) => {
            assert_eq!(message, "Token has been revoked.");
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
}

/// Validates email-domain enforcement against the fetched profile.
///
/// # Test Steps
/// 1. Configure an allow-list of example.com and start a login
/// 2. Mock the token endpoint and a userinfo profile on other.com
/// 3. Verify the callback fails auth-failed mentioning "not allowed"
/// 4. Restart with a profile on example.com and verify success
#[tokio::test]
async fn test_domain_allow_list_enforcement() {
    let server = MockServer::start().await;
    let config = test_config(&server).with_allowed_domains(vec!["example.com".to_string()]);
    let (client, medium) = client_with_medium(config);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(Some("refresh_abc"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "108177",
            "email": "user@other.com",
            "verified_email": true,
        })))
        .mount(&server)
        .await;

    client.start_login().unwrap();
    let state = medium.get(OAUTH_STATE_KEY).unwrap().unwrap();

    let result = client.handle_callback(&callback_url("code_1", &state)).await;
    match result {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::AuthFailed);
            assert!(e.to_string().contains("not allowed"));
            assert!(e.to_string().contains("other.com"));
        }
        Ok(_) => panic!("foreign domain must be rejected"),
    }

    // Rejected attempt leaves the transient entries; a new login overwrites
    // them and an allowed account completes.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(Some("refresh_abc"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "108177",
            "email": "user@example.com",
            "verified_email": true,
        })))
        .mount(&server)
        .await;

    client.start_login().unwrap();
    let state = medium.get(OAUTH_STATE_KEY).unwrap().unwrap();

    let tokens = client.handle_callback(&callback_url("code_2", &state)).await.unwrap();
    assert!(!tokens.access_token.is_empty());
}

/// Validates the userinfo profile mapping and failure kind.
///
/// # Test Steps
/// 1. Mock the userinfo endpoint with a full Google profile
/// 2. Verify the normalized shape (id→sub, verified_email→email_verified)
/// 3. Remount with a 401 and verify the user-fetch-error kind
#[tokio::test]
async fn test_userinfo_mapping_and_failure() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "108177",
            "email": "user@example.com",
            "verified_email": true,
            "name": "Test User",
            "given_name": "Test",
            "family_name": "User",
            "picture": "https://example.com/photo.jpg",
            "locale": "en",
        })))
        .mount(&server)
        .await;

    let profile = client.get_user_info("access_token").await.unwrap();
    assert_eq!(profile.sub, "108177");
    assert_eq!(profile.email.as_deref(), Some("user@example.com"));
    assert_eq!(profile.email_verified, Some(true));
    assert_eq!(profile.given_name.as_deref(), Some("Test"));

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.get_user_info("expired_token").await;
    match result {
        Err(e) => assert_eq!(e.kind(), ErrorKind::UserFetchError),
        Ok(_) => panic!("401 must fail the profile fetch"),
    }
}

/// Validates that revocation never raises, whatever the server does.
///
/// # Test Steps
/// 1. Mock the revoke endpoint with a 500
/// 2. Revoke a token and observe no failure surfaces
#[tokio::test]
async fn test_revoke_is_best_effort() {
    let server = MockServer::start().await;
    let (client, _medium) = client_with_medium(test_config(&server));

    Mock::given(method("POST"))
        .and(path("/revoke"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    client.revoke_token("any_token").await;
}

/// Validates the session orchestrator end to end: login, lifecycle queries,
/// logout.
///
/// # Test Steps
/// 1. Complete a login through the session against mocked endpoints
/// 2. Verify authentication state, stored tokens, and the scheduled timer
/// 3. Log out and verify revocation fired, the store cleared, and the timer
///    is gone
#[tokio::test]
async fn test_session_login_logout_cycle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(Some("refresh_abc"))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let medium = Arc::new(InMemoryMedium::new());
    let client =
        OAuthClient::new(test_config(&server), Arc::clone(&medium) as Arc<dyn KeyValueMedium>)
            .unwrap();
    let manager = TokenManager::new(Arc::new(MemoryTokenStore::new()));
    let session = AuthSession::new(client, manager);

    assert!(!session.is_authenticated());

    session.start_login().unwrap();
    let state = medium.get(OAUTH_STATE_KEY).unwrap().unwrap();

    let tokens = session.complete_login(&callback_url("code_1", &state)).await.unwrap();
    assert!(session.is_authenticated());
    assert!(session.has_refresh_task());
    assert_eq!(session.manager().refresh_token().as_deref(), Some("refresh_abc"));
    assert!(session.manager().is_token_valid(0));
    assert_eq!(session.manager().access_token(), Some(tokens.access_token));

    // Stored record was stamped at write time.
    let stored = session.manager().get_tokens().unwrap().unwrap();
    assert!(stored.issued_at.is_some());

    session.logout().await.unwrap();
    assert!(!session.is_authenticated());
    assert!(!session.has_refresh_task());
    assert!(session.manager().get_tokens().unwrap().is_none());
}

/// Validates that the session refreshes a token sitting inside the buffer
/// window before handing it out.
///
/// # Test Steps
/// 1. Store a token expiring inside the refresh buffer, with a refresh token
/// 2. Mock the token endpoint to return a long-lived replacement
/// 3. Ask the session for an access token
/// 4. Verify the replacement was fetched, stored, and returned
#[tokio::test]
async fn test_session_refreshes_before_handout() {
    let server = MockServer::start().await;

    let fresh_access = make_jwt(3600);
    let mut body = token_body(None);
    body["access_token"] = serde_json::Value::String(fresh_access.clone());
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let medium: Arc<dyn KeyValueMedium> = Arc::new(InMemoryMedium::new());
    let client = OAuthClient::new(test_config(&server), medium).unwrap();
    let manager = TokenManager::new(Arc::new(MemoryTokenStore::new()));
    let session = AuthSession::new(client, manager);

    let expiring = beacon_auth::TokenSet::new(
        make_jwt(120),
        Some("old_refresh".to_string()),
        None,
        120,
        None,
    );
    session.manager().set_tokens(&expiring).unwrap();
    assert!(session.manager().should_refresh(300));

    let handed_out = session.access_token().await.unwrap();
    assert_eq!(handed_out, fresh_access);

    // The refresh response omitted a refresh token, so the old one stays.
    assert_eq!(session.manager().refresh_token().as_deref(), Some("old_refresh"));
}
