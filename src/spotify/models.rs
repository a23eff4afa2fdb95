//! Data models for the streaming provider's Web API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Simplified artist as embedded in tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: Option<u32>,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Followers {
    pub total: u64,
}

/// Full artist as returned by the top-artists endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub followers: Option<Followers>,
}

/// A playlist as seen on the provider, flattened from its wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub description: Option<String>,
    pub tracks_total: u32,
    #[serde(default)]
    pub images: Vec<Image>,
    pub external_url: Option<String>,
}

/// The authenticated user's provider profile.
#[derive(Debug, Clone, Deserialize)]
pub struct PrivateUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Listening history window for the top-items endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "short_term" => Some(TimeRange::ShortTerm),
            "medium_term" => Some(TimeRange::MediumTerm),
            "long_term" => Some(TimeRange::LongTerm),
            _ => None,
        }
    }
}
