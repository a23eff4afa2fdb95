//! End-to-end tests for authentication and sessions
//!
//! The browser half of the OAuth flow cannot run here, so these tests cover
//! the public surface, the disabled login flow, session token handling and
//! logout. Sessions are seeded straight into the store via TestServer.

mod common;

use common::{TestClient, TestServer, ALICE_NAME, ALICE_SPOTIFY_ID};
use reqwest::StatusCode;

// =============================================================================
// Public Surface
// =============================================================================

#[tokio::test]
async fn test_home_is_public_and_reports_server_identity() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_home().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["server"], "groovemate-server");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime"].as_str().unwrap().contains('d'));
}

#[tokio::test]
async fn test_protected_routes_require_a_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(client.get_session().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(client.get_me().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        client.get_top_tracks(None, None).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(client.get_playlists().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(client.get_users().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(client.get_friends().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_session_tokens_are_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone(), "not-a-real-token");

    assert_eq!(client.get_me().await.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Login Flow
// =============================================================================

#[tokio::test]
async fn test_login_is_unavailable_without_provider_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login().await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Login is not configured on this server");
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_session_reports_the_logged_in_user() {
    let server = TestServer::spawn().await;
    let (user_id, token) = server.seed_user(ALICE_SPOTIFY_ID, ALICE_NAME);
    let client = TestClient::authenticated(server.base_url.clone(), &token);

    let response = client.get_session().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], user_id as u64);
    assert_eq!(body["spotify_id"], ALICE_SPOTIFY_ID);
    assert_eq!(body["display_name"], ALICE_NAME);
}

#[tokio::test]
async fn test_logout_invalidates_the_session_token() {
    let server = TestServer::spawn().await;
    let (_user_id, token) = server.seed_user(ALICE_SPOTIFY_ID, ALICE_NAME);
    let client = TestClient::authenticated(server.base_url.clone(), &token);

    assert_eq!(client.get_me().await.status(), StatusCode::OK);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    // The token no longer works
    assert_eq!(client.get_me().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_expires_the_session_cookie() {
    let server = TestServer::spawn().await;
    let (_user_id, token) = server.seed_user(ALICE_SPOTIFY_ID, ALICE_NAME);
    let client = TestClient::authenticated(server.base_url.clone(), &token);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("Logout should clear the session cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("session_token="));
    assert!(set_cookie.contains("Expires="));
}

#[tokio::test]
async fn test_logging_out_one_session_leaves_others_alone() {
    let server = TestServer::spawn().await;
    let (user_id, token) = server.seed_user(ALICE_SPOTIFY_ID, ALICE_NAME);
    let (_user_id, other_token) = {
        // Same user, second device
        use groovemate_server::store::{SessionToken, SessionTokenStore, SessionTokenValue};
        let value = SessionTokenValue::generate();
        server
            .store
            .add_session_token(SessionToken {
                user_id,
                created: std::time::SystemTime::now(),
                last_used: None,
                value: value.clone(),
            })
            .unwrap();
        (user_id, value.0)
    };

    let first = TestClient::authenticated(server.base_url.clone(), &token);
    let second = TestClient::authenticated(server.base_url.clone(), &other_token);

    assert_eq!(first.logout().await.status(), StatusCode::OK);

    assert_eq!(first.get_me().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(second.get_me().await.status(), StatusCode::OK);
}
