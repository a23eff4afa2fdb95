use super::auth::{SpotifyAuthClient, TokenSet};
use crate::store::{FullStore, ProviderTokens};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Tokens this close to expiry get refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Hands out provider access tokens, transparently refreshing cached ones
/// that are about to lapse.
pub struct TokenKeeper {
    store: Arc<dyn FullStore>,
    auth_client: Option<Arc<SpotifyAuthClient>>,
}

impl TokenKeeper {
    pub fn new(store: Arc<dyn FullStore>, auth_client: Option<Arc<SpotifyAuthClient>>) -> Self {
        Self { store, auth_client }
    }

    /// A usable access token for the user.
    ///
    /// Returns Ok(None) if the user has no cached tokens, or has a stale one
    /// with no way to refresh it. Returns Err if the provider rejects the
    /// refresh or the store fails.
    pub async fn access_token_for(&self, user_id: usize) -> Result<Option<String>> {
        let Some(tokens) = self.store.get_provider_tokens(user_id)? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        if tokens.expires_at - now > REFRESH_MARGIN_SECS {
            return Ok(Some(tokens.access_token));
        }

        let Some(auth_client) = &self.auth_client else {
            debug!(
                "Cached token for user {} is stale and no auth client is configured",
                user_id
            );
            return Ok(None);
        };

        debug!("Refreshing provider tokens for user {}", user_id);
        let refreshed = auth_client.refresh_tokens(&tokens.refresh_token).await?;
        self.store.upsert_provider_tokens(ProviderTokens {
            user_id,
            access_token: refreshed.access_token.clone(),
            // The provider does not always rotate the refresh token.
            refresh_token: refreshed.refresh_token.unwrap_or(tokens.refresh_token),
            expires_at: now + refreshed.expires_in_secs as i64,
            updated: SystemTime::now(),
        })?;
        Ok(Some(refreshed.access_token))
    }

    /// Persist the outcome of a login code exchange for the user.
    pub fn store_exchanged(&self, user_id: usize, set: &TokenSet) -> Result<()> {
        let refresh_token = set
            .refresh_token
            .clone()
            .ok_or_else(|| anyhow!("Provider did not return a refresh token"))?;
        let now = chrono::Utc::now().timestamp();
        self.store.upsert_provider_tokens(ProviderTokens {
            user_id,
            access_token: set.access_token.clone(),
            refresh_token,
            expires_at: now + set.expires_in_secs as i64,
            updated: SystemTime::now(),
        })
    }
}
