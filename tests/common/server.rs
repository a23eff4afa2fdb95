//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and its own
//! scripted provider mock. There is no way to run the browser half of the
//! OAuth flow in a test, so users, sessions and provider tokens are seeded
//! straight into the store instead.

use super::constants::*;
use super::mock::MockSpotify;
use groovemate_server::spotify::AuthStateStore;
use groovemate_server::store::{
    ProviderTokenStore, ProviderTokens, SessionToken, SessionTokenStore, SessionTokenValue,
    SqliteStore, UserStore,
};
use groovemate_server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are
/// cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Store handle for seeding and inspecting rows in tests
    pub store: Arc<SqliteStore>,

    /// The scripted provider behind the server
    pub spotify: Arc<MockSpotify>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary database
    /// 2. Wires the routes to a scripted provider mock
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// The server runs without provider credentials, so /v1/auth/login
    /// reports 503. Authenticated tests go through `seed_user` instead.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Database creation fails
    /// - Port binding fails
    /// - Server fails to start
    /// - Server doesn't become ready within timeout
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_db_dir.path().join("groovemate.db");
        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to open store"));
        let spotify = Arc::new(MockSpotify::new());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            post_login_redirect: "/".to_string(),
        };

        let app = make_app(
            config,
            store.clone(),
            spotify.clone(),
            None, // no provider credentials, the login flow stays disabled
            Arc::new(AuthStateStore::new()),
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            store,
            spotify,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Registers a user with an active session and fresh provider tokens.
    ///
    /// Returns the user id and the session token value to send in the
    /// Authorization header.
    pub fn seed_user(&self, spotify_id: &str, display_name: &str) -> (usize, String) {
        let (user_id, token) = self.seed_user_without_provider_tokens(spotify_id, display_name);

        self.store
            .upsert_provider_tokens(ProviderTokens {
                user_id,
                access_token: format!("access-token-{}", spotify_id),
                refresh_token: format!("refresh-token-{}", spotify_id),
                expires_at: chrono::Utc::now().timestamp() + 3600,
                updated: SystemTime::now(),
            })
            .expect("Failed to cache provider tokens");

        (user_id, token)
    }

    /// Registers a user with an active session but no cached provider
    /// tokens, as after the provider side of an account went away.
    pub fn seed_user_without_provider_tokens(
        &self,
        spotify_id: &str,
        display_name: &str,
    ) -> (usize, String) {
        let user_id = self
            .store
            .create_user(spotify_id, display_name)
            .expect("Failed to create test user");

        let token = SessionTokenValue::generate();
        self.store
            .add_session_token(SessionToken {
                user_id,
                created: SystemTime::now(),
                last_used: None,
                value: token.clone(),
            })
            .expect("Failed to create test session");

        (user_id, token.0)
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
