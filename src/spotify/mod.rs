mod auth;
mod client;
mod models;
mod tokens;

pub use auth::{AuthState, AuthStateStore, SpotifyAuthClient, TokenSet};
pub use client::SpotifyClient;
pub use models::{
    AlbumRef, Artist, ArtistRef, Followers, Image, Playlist, PrivateUser, TimeRange, Track,
};
pub use tokens::TokenKeeper;

use anyhow::Result;
use async_trait::async_trait;

/// The slice of the provider's Web API this server talks to. All calls act on
/// behalf of the user owning the passed access token.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// The profile of the token's owner.
    async fn get_me(&self, access_token: &str) -> Result<PrivateUser>;

    /// Most listened tracks over the given history window, best first.
    async fn get_top_tracks(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Track>>;

    /// Most listened artists over the given history window, best first.
    async fn get_top_artists(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Artist>>;

    /// The genre names the recommendations endpoint accepts as seeds.
    async fn get_available_genre_seeds(&self, access_token: &str) -> Result<Vec<String>>;

    /// Track recommendations for up to five seed genres.
    async fn get_recommendations(
        &self,
        access_token: &str,
        seed_genres: &[String],
        limit: u32,
    ) -> Result<Vec<Track>>;

    /// Track search with the provider's query syntax, e.g. `year:1990-1999`.
    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>>;

    /// All playlists on the token owner's account, following pagination.
    async fn get_my_playlists(&self, access_token: &str) -> Result<Vec<Playlist>>;

    /// Creates a private playlist on the given provider account.
    async fn create_playlist(
        &self,
        access_token: &str,
        provider_user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist>;

    async fn add_tracks_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()>;

    /// Removes the playlist from the token owner's account. The provider has
    /// no delete, unfollowing one's own playlist is how playlists go away.
    async fn unfollow_playlist(&self, access_token: &str, playlist_id: &str) -> Result<()>;
}
