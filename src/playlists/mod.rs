//! Playlist generation from genre and era seeds.
//!
//! Generation workflow:
//! 1. Validate the seeds and the requested track count
//! 2. Gather candidate tracks from the provider (recommendations or
//!    year-range searches)
//! 3. Create a private playlist on the user's provider account and add the
//!    tracks to it
//! 4. Persist the playlist id, uri and seeds locally so the server can list
//!    and reconcile it later

use crate::spotify::{Playlist, SpotifyApi, Track};
use crate::store::{FullStore, PlaylistKind, StoredPlaylist};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

pub const MAX_GENRE_SEEDS: usize = 5;
pub const MAX_DECADE_SEEDS: usize = 3;
pub const MIN_SEED_YEAR: i32 = 1900;
pub const MAX_SEED_YEAR: i32 = 2029;
pub const DEFAULT_TRACK_LIMIT: u32 = 20;
pub const MAX_TRACK_LIMIT: u32 = 50;

/// Errors from playlist operations, split so the server can map provider
/// failures and store failures to different status codes.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("{0}")]
    Invalid(String),

    #[error("No tracks matched the given seeds")]
    NoTracks,

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Store error: {0}")]
    Store(anyhow::Error),
}

/// A freshly generated playlist, already live on the provider.
#[derive(Debug, Clone)]
pub struct GeneratedPlaylist {
    pub playlist: Playlist,
    pub track_count: usize,
}

pub struct PlaylistManager {
    store: Arc<dyn FullStore>,
    spotify: Arc<dyn SpotifyApi>,
}

impl PlaylistManager {
    pub fn new(store: Arc<dyn FullStore>, spotify: Arc<dyn SpotifyApi>) -> Self {
        Self { store, spotify }
    }

    /// Generate a playlist from 1..=5 genre seeds.
    pub async fn generate_from_genres(
        &self,
        access_token: &str,
        user_id: usize,
        provider_user_id: &str,
        genres: &[String],
        limit: Option<u32>,
    ) -> Result<GeneratedPlaylist, PlaylistError> {
        if genres.is_empty() || genres.len() > MAX_GENRE_SEEDS {
            return Err(PlaylistError::Invalid(format!(
                "Between 1 and {} genre seeds are required",
                MAX_GENRE_SEEDS
            )));
        }
        if genres.iter().any(|g| g.trim().is_empty()) {
            return Err(PlaylistError::Invalid(
                "Genre seeds must not be empty".to_string(),
            ));
        }
        let limit = resolve_limit(limit)?;

        let tracks = self
            .spotify
            .get_recommendations(access_token, genres, limit)
            .await?;
        if tracks.is_empty() {
            return Err(PlaylistError::NoTracks);
        }

        let label = genres.join(" + ");
        let name = if label.len() > 60 {
            format!("Groovemate {} genre mix", genres.len())
        } else {
            format!("Groovemate {} mix", label)
        };
        let description = format!(
            "Generated on {} from genre seeds: {}",
            chrono::Local::now().format("%Y-%m-%d"),
            genres.join(", ")
        );

        self.publish(
            access_token,
            user_id,
            provider_user_id,
            &name,
            &description,
            PlaylistKind::Genres,
            genres.to_vec(),
            tracks,
        )
        .await
    }

    /// Generate a playlist from 1..=3 decade seeds. Any year within a decade
    /// selects it; tracks are gathered per decade, interleaved and
    /// deduplicated so no single era dominates the front of the playlist.
    pub async fn generate_from_decades(
        &self,
        access_token: &str,
        user_id: usize,
        provider_user_id: &str,
        years: &[i32],
        limit: Option<u32>,
    ) -> Result<GeneratedPlaylist, PlaylistError> {
        if years.is_empty() || years.len() > MAX_DECADE_SEEDS {
            return Err(PlaylistError::Invalid(format!(
                "Between 1 and {} decades are required",
                MAX_DECADE_SEEDS
            )));
        }
        if let Some(year) = years
            .iter()
            .find(|y| !(MIN_SEED_YEAR..=MAX_SEED_YEAR).contains(y))
        {
            return Err(PlaylistError::Invalid(format!(
                "Year {} is outside {}..={}",
                year, MIN_SEED_YEAR, MAX_SEED_YEAR
            )));
        }
        let limit = resolve_limit(limit)?;

        let mut decades: Vec<i32> = Vec::new();
        for year in years {
            let start = floor_to_decade(*year);
            if !decades.contains(&start) {
                decades.push(start);
            }
        }

        let mut groups = Vec::with_capacity(decades.len());
        for start in &decades {
            let query = format!("year:{}-{}", start, start + 9);
            let found = self
                .spotify
                .search_tracks(access_token, &query, limit)
                .await?;
            groups.push(found);
        }

        let mut tracks = dedupe_by_id(interleave(groups));
        tracks.truncate(limit as usize);
        if tracks.is_empty() {
            return Err(PlaylistError::NoTracks);
        }

        let labels: Vec<String> = decades.iter().map(|d| format!("{}s", d)).collect();
        let name = format!("Groovemate {} mix", labels.join(" + "));
        let description = format!(
            "Generated on {} from decades: {}",
            chrono::Local::now().format("%Y-%m-%d"),
            labels.join(", ")
        );
        let seeds = decades.iter().map(|d| d.to_string()).collect();

        self.publish(
            access_token,
            user_id,
            provider_user_id,
            &name,
            &description,
            PlaylistKind::Decades,
            seeds,
            tracks,
        )
        .await
    }

    /// The user's stored playlists, reconciled against the provider first:
    /// rows whose playlist no longer exists on the provider are dropped.
    /// Reconciliation only acts on a successful listing, a provider error
    /// leaves the rows untouched.
    pub async fn list_for_user(
        &self,
        access_token: &str,
        user_id: usize,
    ) -> Result<Vec<StoredPlaylist>, PlaylistError> {
        let current = self.spotify.get_my_playlists(access_token).await?;
        let present_ids: Vec<String> = current.into_iter().map(|p| p.id).collect();
        let deleted = self
            .store
            .retain_playlists(user_id, &present_ids)
            .map_err(PlaylistError::Store)?;
        if deleted > 0 {
            info!(
                "Reconciliation removed {} playlists no longer on the provider for user {}",
                deleted, user_id
            );
        }
        self.store
            .get_user_playlists(user_id)
            .map_err(PlaylistError::Store)
    }

    /// Unfollow the playlist on the provider and drop the stored row.
    /// Returns Ok(false) when the row does not exist or belongs to another
    /// user; the provider is not contacted in that case.
    pub async fn delete(
        &self,
        access_token: &str,
        user_id: usize,
        playlist_id: &str,
    ) -> Result<bool, PlaylistError> {
        if self
            .store
            .get_playlist(playlist_id, user_id)
            .map_err(PlaylistError::Store)?
            .is_none()
        {
            return Ok(false);
        }
        self.spotify
            .unfollow_playlist(access_token, playlist_id)
            .await?;
        self.store
            .delete_playlist(playlist_id, user_id)
            .map_err(PlaylistError::Store)
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish(
        &self,
        access_token: &str,
        user_id: usize,
        provider_user_id: &str,
        name: &str,
        description: &str,
        kind: PlaylistKind,
        seeds: Vec<String>,
        tracks: Vec<Track>,
    ) -> Result<GeneratedPlaylist, PlaylistError> {
        let playlist = self
            .spotify
            .create_playlist(access_token, provider_user_id, name, description)
            .await?;

        let uris: Vec<String> = tracks.iter().map(|t| t.uri.clone()).collect();
        self.spotify
            .add_tracks_to_playlist(access_token, &playlist.id, &uris)
            .await?;

        self.store
            .add_playlist(StoredPlaylist {
                id: playlist.id.clone(),
                user_id,
                uri: playlist.uri.clone(),
                name: playlist.name.clone(),
                kind: Some(kind),
                seeds,
                created: SystemTime::now(),
            })
            .map_err(PlaylistError::Store)?;

        info!(
            "Created playlist {} with {} tracks for user {}",
            playlist.id,
            uris.len(),
            user_id
        );

        Ok(GeneratedPlaylist {
            playlist,
            track_count: uris.len(),
        })
    }
}

fn resolve_limit(limit: Option<u32>) -> Result<u32, PlaylistError> {
    let limit = limit.unwrap_or(DEFAULT_TRACK_LIMIT);
    if !(1..=MAX_TRACK_LIMIT).contains(&limit) {
        return Err(PlaylistError::Invalid(format!(
            "Limit must be between 1 and {}",
            MAX_TRACK_LIMIT
        )));
    }
    Ok(limit)
}

fn floor_to_decade(year: i32) -> i32 {
    year - year % 10
}

/// Round-robin across the per-decade result lists.
fn interleave(groups: Vec<Vec<Track>>) -> Vec<Track> {
    let mut queues: Vec<VecDeque<Track>> = groups.into_iter().map(Into::into).collect();
    let mut out = Vec::new();
    loop {
        let mut pushed = false;
        for queue in &mut queues {
            if let Some(track) = queue.pop_front() {
                out.push(track);
                pushed = true;
            }
        }
        if !pushed {
            break;
        }
    }
    out
}

fn dedupe_by_id(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks.into_iter().filter(|t| seen.insert(t.id.clone())).collect()
}
