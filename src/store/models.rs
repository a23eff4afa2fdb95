//! Persisted data models
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Clone, Serialize, Debug)]
pub struct User {
    pub id: usize,
    pub spotify_id: String,
    pub display_name: String,
    pub bio: String,
    pub created: SystemTime,
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct SessionTokenValue(pub String);

impl SessionTokenValue {
    pub fn generate() -> SessionTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        SessionTokenValue(random_string)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SessionToken {
    pub user_id: usize,
    pub created: SystemTime,
    pub last_used: Option<SystemTime>,
    pub value: SessionTokenValue,
}

/// Tokens the provider issued for a user. Only ever read server side,
/// hence no Serialize.
#[derive(Clone, Debug)]
pub struct ProviderTokens {
    pub user_id: usize,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp after which access_token is no longer valid.
    pub expires_at: i64,
    pub updated: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistKind {
    Genres,
    Decades,
}

impl PlaylistKind {
    pub fn to_int(&self) -> i32 {
        match self {
            PlaylistKind::Genres => 0,
            PlaylistKind::Decades => 1,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            0 => Some(PlaylistKind::Genres),
            1 => Some(PlaylistKind::Decades),
            _ => None,
        }
    }
}

/// A playlist we created on the provider for a user. The id and uri are
/// the provider's, the row only records ownership and the seeds that
/// produced it.
#[derive(Clone, Serialize, Debug)]
pub struct StoredPlaylist {
    pub id: String,
    pub user_id: usize,
    pub uri: String,
    pub name: String,
    pub kind: Option<PlaylistKind>,
    pub seeds: Vec<String>,
    pub created: SystemTime,
}

#[derive(Clone, Serialize, Debug)]
pub struct Comment {
    pub id: usize,
    pub author_id: usize,
    pub author_name: String,
    pub recipient_id: usize,
    pub text: String,
    pub created: SystemTime,
}
