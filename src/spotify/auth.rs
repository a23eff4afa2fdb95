//! OAuth flow against the provider's accounts service.
//!
//! Authorization URL generation with PKCE, code exchange and token refresh.
//! The state handed to the provider is kept server side in an
//! [`AuthStateStore`] until the callback comes back with it.

use crate::config::SpotifyConfig;
use anyhow::{anyhow, Context, Result};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const STATE_TTL_SECS: i64 = 300;
const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 10;

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// HTTP client for token endpoint requests
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

/// State stored during the authorization flow (between /login and /callback)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    /// Token for `state` parameter validation
    pub csrf_token: String,
    /// PKCE code verifier (stored server-side for security)
    pub pkce_verifier: String,
    /// Timestamp when this state was created (for expiration)
    pub created_at: i64,
}

impl AuthState {
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > STATE_TTL_SECS
    }
}

/// Result of a successful code exchange or token refresh
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    /// Absent on refresh responses when the provider keeps the old one valid
    pub refresh_token: Option<String>,
    pub expires_in_secs: u64,
}

impl TokenSet {
    fn from_response(response: &BasicTokenResponse) -> Self {
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_in_secs: response.expires_in().map(|d| d.as_secs()).unwrap_or(3600),
        }
    }
}

/// OAuth client wrapper
pub struct SpotifyAuthClient {
    client: ConfiguredClient,
    scopes: Vec<String>,
}

impl SpotifyAuthClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self> {
        let base = config
            .accounts_base_url
            .as_deref()
            .unwrap_or(ACCOUNTS_BASE)
            .trim_end_matches('/')
            .to_string();

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(format!("{}/authorize", base)).context("Invalid authorize URL")?,
            )
            .set_token_uri(
                TokenUrl::new(format!("{}/api/token", base)).context("Invalid token URL")?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    /// Generate an authorization URL for the login flow
    ///
    /// Returns the URL to redirect the user to, along with the state that must
    /// be stored server-side and validated in the callback. `show_dialog` is
    /// always on so switching provider accounts stays possible.
    pub fn authorize_url(&self) -> (String, AuthState) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("show_dialog", "true")
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token) = request.url();

        let state = AuthState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            created_at: chrono::Utc::now().timestamp(),
        };

        debug!(
            "Generated authorization URL with state: {}",
            state.csrf_token
        );

        (auth_url.to_string(), state)
    }

    /// Exchange an authorization code for tokens
    ///
    /// Validates the returned state against the stored one, then exchanges
    /// the code with the PKCE verifier from the stored state.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        stored_state: &AuthState,
    ) -> Result<TokenSet> {
        if state != stored_state.csrf_token {
            return Err(anyhow!("Authorization state mismatch"));
        }

        if stored_state.is_expired() {
            return Err(anyhow!("Authorization state expired"));
        }

        let http = http_client()?;
        let pkce_verifier = PkceCodeVerifier::new(stored_state.pkce_verifier.clone());

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http)
            .await
            .map_err(|e| anyhow!("Failed to exchange authorization code: {}", e))?;

        Ok(TokenSet::from_response(&token_response))
    }

    /// Trade a refresh token for a fresh access token
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenSet> {
        let http = http_client()?;

        let token_response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http)
            .await
            .map_err(|e| anyhow!("Failed to refresh access token: {}", e))?;

        Ok(TokenSet::from_response(&token_response))
    }
}

/// Thread-safe storage for auth states (in-memory for simplicity)
pub struct AuthStateStore {
    states: RwLock<HashMap<String, AuthState>>,
}

impl AuthStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Store an auth state, keyed by its state token
    pub async fn store(&self, state: AuthState) {
        let key = state.csrf_token.clone();
        let mut states = self.states.write().await;
        states.insert(key, state);
    }

    /// Retrieve and remove an auth state by its state token
    pub async fn take(&self, csrf_token: &str) -> Option<AuthState> {
        let mut states = self.states.write().await;
        states.remove(csrf_token)
    }

    /// Clean up states older than the flow TTL
    pub async fn cleanup_expired(&self) {
        let now = chrono::Utc::now().timestamp();
        let mut states = self.states.write().await;
        states.retain(|_, state| now - state.created_at < STATE_TTL_SECS);
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_scopes;

    fn test_config() -> SpotifyConfig {
        SpotifyConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "http://127.0.0.1:3000/v1/auth/callback".to_string(),
            scopes: default_scopes(),
            accounts_base_url: None,
            api_base_url: None,
        }
    }

    fn test_state(created_at: i64) -> AuthState {
        AuthState {
            csrf_token: "state-token".to_string(),
            pkce_verifier: "verifier".to_string(),
            created_at,
        }
    }

    #[test]
    fn authorize_url_carries_pkce_and_scopes() {
        let client = SpotifyAuthClient::new(&test_config()).unwrap();
        let (url, state) = client.authorize_url();

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("code_challenge="));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("show_dialog=true"));
        assert!(url.contains("scope="));
        assert!(url.contains("user-top-read"));
        assert!(url.contains(&format!("state={}", state.csrf_token)));
        assert!(!state.pkce_verifier.is_empty());
    }

    #[test]
    fn authorize_url_honours_accounts_base_override() {
        let config = SpotifyConfig {
            accounts_base_url: Some("http://localhost:9999/".to_string()),
            ..test_config()
        };
        let client = SpotifyAuthClient::new(&config).unwrap();
        let (url, _) = client.authorize_url();
        assert!(url.starts_with("http://localhost:9999/authorize?"));
    }

    #[tokio::test]
    async fn exchange_rejects_mismatched_state() {
        let client = SpotifyAuthClient::new(&test_config()).unwrap();
        let stored = test_state(chrono::Utc::now().timestamp());

        let err = client
            .exchange_code("code", "some-other-state", &stored)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
    }

    #[tokio::test]
    async fn exchange_rejects_expired_state() {
        let client = SpotifyAuthClient::new(&test_config()).unwrap();
        let stored = test_state(chrono::Utc::now().timestamp() - 400);

        let err = client
            .exchange_code("code", "state-token", &stored)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn state_store_hands_out_each_state_once() {
        let store = AuthStateStore::new();
        store
            .store(test_state(chrono::Utc::now().timestamp()))
            .await;

        let retrieved = store.take("state-token").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().pkce_verifier, "verifier");

        assert!(store.take("state-token").await.is_none());
    }

    #[tokio::test]
    async fn state_store_cleanup_drops_expired_states() {
        let store = AuthStateStore::new();
        store
            .store(test_state(chrono::Utc::now().timestamp() - 400))
            .await;
        store.cleanup_expired().await;

        assert!(store.take("state-token").await.is_none());
    }
}
