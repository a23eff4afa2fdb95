use crate::spotify::PrivateUser;
use crate::store::{FullStore, SessionToken, SessionTokenValue};
use anyhow::Result;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

/// Local account lifecycle: registration on first login, session issuing
/// and account deletion.
pub struct UserManager {
    store: Arc<dyn FullStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn FullStore>) -> Self {
        Self { store }
    }

    /// Map a provider profile to a local user id, creating the user on
    /// first login. Returns the id and whether the user was just registered.
    ///
    /// A returning user's display name is kept in sync with the provider.
    pub fn resolve_login(&self, profile: &PrivateUser) -> Result<(usize, bool)> {
        let display_name = profile
            .display_name
            .clone()
            .unwrap_or_else(|| profile.id.clone());

        if let Some(user_id) = self.store.get_user_id_by_spotify_id(&profile.id)? {
            if let Some(user) = self.store.get_user(user_id)? {
                if user.display_name != display_name {
                    self.store.update_user_display_name(user_id, &display_name)?;
                }
            }
            return Ok((user_id, false));
        }

        let user_id = self.store.create_user(&profile.id, &display_name)?;
        info!("Registered new user {} for account {}", user_id, profile.id);
        Ok((user_id, true))
    }

    /// Issue a fresh session token for the user.
    pub fn start_session(&self, user_id: usize) -> Result<SessionToken> {
        let token = SessionToken {
            user_id,
            value: SessionTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.store.add_session_token(token.clone())?;
        Ok(token)
    }

    /// Drop a session token. Returns the token that was removed, None when
    /// it did not exist.
    pub fn end_session(&self, value: &SessionTokenValue) -> Result<Option<SessionToken>> {
        self.store.delete_session_token(value)
    }

    /// Delete the user's account. Sessions, provider tokens, playlists,
    /// friendships and comments go with it.
    pub fn delete_account(&self, user_id: usize) -> Result<()> {
        self.store.delete_user(user_id)?;
        info!("Deleted account of user {}", user_id);
        Ok(())
    }
}
