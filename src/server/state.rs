use axum::extract::FromRef;

use crate::playlists::PlaylistManager;
use crate::spotify::{AuthStateStore, SpotifyApi, SpotifyAuthClient, TokenKeeper};
use crate::store::FullStore;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedStore = Arc<dyn FullStore>;
pub type GuardedSpotify = Arc<dyn SpotifyApi>;
pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedPlaylistManager = Arc<PlaylistManager>;
pub type GuardedTokenKeeper = Arc<TokenKeeper>;
pub type OptionalAuthClient = Option<Arc<SpotifyAuthClient>>;
pub type GuardedAuthStateStore = Arc<AuthStateStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedStore,
    pub spotify: GuardedSpotify,
    pub user_manager: GuardedUserManager,
    pub playlist_manager: GuardedPlaylistManager,
    pub token_keeper: GuardedTokenKeeper,
    pub auth_client: OptionalAuthClient,
    pub auth_state_store: GuardedAuthStateStore,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedSpotify {
    fn from_ref(input: &ServerState) -> Self {
        input.spotify.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistManager {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedTokenKeeper {
    fn from_ref(input: &ServerState) -> Self {
        input.token_keeper.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for OptionalAuthClient {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_client.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthStateStore {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_state_store.clone()
    }
}
