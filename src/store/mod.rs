mod models;
mod sqlite_store;

pub use models::{
    Comment, PlaylistKind, ProviderTokens, SessionToken, SessionTokenValue, StoredPlaylist, User,
};
pub use sqlite_store::SqliteStore;

use anyhow::Result;

pub trait UserStore: Send + Sync {
    /// Creates a user for the given provider profile and returns its id.
    /// Returns Err when the provider account is already registered.
    fn create_user(&self, spotify_id: &str, display_name: &str) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    /// Returns Err if there is a database error.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    /// Returns the user id tied to a provider account.
    /// Returns Ok(None) if the account was never registered.
    fn get_user_id_by_spotify_id(&self, spotify_id: &str) -> Result<Option<usize>>;

    /// Returns all users ordered by display name.
    fn get_all_users(&self) -> Result<Vec<User>>;

    /// Updates the display name. Unknown user ids are a no-op.
    fn update_user_display_name(&self, user_id: usize, display_name: &str) -> Result<()>;

    /// Updates the profile bio. Unknown user ids are a no-op.
    fn update_user_bio(&self, user_id: usize, bio: &str) -> Result<()>;

    /// Deletes the user row. Session tokens, provider tokens, playlists,
    /// friendships and comments cascade with it.
    fn delete_user(&self, user_id: usize) -> Result<()>;
}

pub trait SessionTokenStore: Send + Sync {
    /// Adds a new session token.
    fn add_session_token(&self, token: SessionToken) -> Result<()>;

    /// Returns Ok(None) if the token does not exist.
    /// Returns Err if there is a database error.
    fn get_session_token(&self, value: &SessionTokenValue) -> Result<Option<SessionToken>>;

    /// Deletes a session token, returning the deleted row.
    /// Returns Ok(None) if the token does not exist.
    fn delete_session_token(&self, value: &SessionTokenValue) -> Result<Option<SessionToken>>;

    /// Stamps the token with the current time as last_used.
    fn update_session_token_last_used_timestamp(&self, value: &SessionTokenValue) -> Result<()>;

    /// Deletes session tokens that have not been used for the given number
    /// of days. Returns how many were deleted.
    fn prune_unused_session_tokens(&self, unused_for_days: u64) -> Result<usize>;
}

pub trait ProviderTokenStore: Send + Sync {
    /// Inserts or replaces the provider tokens for a user.
    fn upsert_provider_tokens(&self, tokens: ProviderTokens) -> Result<()>;

    /// Returns Ok(None) if the user never completed a provider login.
    fn get_provider_tokens(&self, user_id: usize) -> Result<Option<ProviderTokens>>;

    /// Drops the provider tokens for a user, forcing a fresh login.
    fn delete_provider_tokens(&self, user_id: usize) -> Result<()>;
}

pub trait PlaylistStore: Send + Sync {
    /// Records a playlist created on the provider.
    fn add_playlist(&self, playlist: StoredPlaylist) -> Result<()>;

    /// Returns the user's recorded playlists, newest first.
    fn get_user_playlists(&self, user_id: usize) -> Result<Vec<StoredPlaylist>>;

    /// Returns Ok(None) if the playlist does not exist or belongs to
    /// another user.
    fn get_playlist(&self, playlist_id: &str, user_id: usize) -> Result<Option<StoredPlaylist>>;

    /// Deletes a recorded playlist. Returns false if there was no such
    /// playlist for this user.
    fn delete_playlist(&self, playlist_id: &str, user_id: usize) -> Result<bool>;

    /// Deletes the user's recorded playlists whose id is not in
    /// `present_ids`. Returns how many rows went away.
    fn retain_playlists(&self, user_id: usize, present_ids: &[String]) -> Result<usize>;
}

pub trait SocialStore: Send + Sync {
    /// Stores the friendship pair once. Returns false when the pair
    /// already exists in either ordering.
    fn add_friendship(&self, user_id: usize, friend_id: usize) -> Result<bool>;

    /// True when a friendship row exists in either ordering.
    fn are_friends(&self, user_id: usize, friend_id: usize) -> Result<bool>;

    /// Deletes the friendship pair whichever way it was stored.
    /// Returns false when the two users were not friends.
    fn delete_friendship(&self, user_id: usize, friend_id: usize) -> Result<bool>;

    /// Returns the user's friends ordered by display name.
    fn get_friends(&self, user_id: usize) -> Result<Vec<User>>;

    /// Adds a comment on the recipient's profile and returns it with the
    /// author's display name resolved.
    fn add_comment(&self, author_id: usize, recipient_id: usize, text: &str) -> Result<Comment>;

    /// Returns the comments left on a user's profile, newest first.
    fn get_comments_for_user(&self, recipient_id: usize) -> Result<Vec<Comment>>;
}

/// Combined trait for everything the server persists.
pub trait FullStore:
    UserStore + SessionTokenStore + ProviderTokenStore + PlaylistStore + SocialStore
{
}

impl<T: UserStore + SessionTokenStore + ProviderTokenStore + PlaylistStore + SocialStore> FullStore
    for T
{
}
