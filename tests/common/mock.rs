//! Scripted stand-in for the streaming provider
//!
//! Canned responses live in plain public fields: tests fill them before
//! making requests and inspect the recorded calls afterwards. Playlists
//! created through the mock stay in its listing until they are unfollowed
//! or a test makes them vanish, which is how reconciliation is exercised.

use anyhow::{bail, Result};
use async_trait::async_trait;
use groovemate_server::spotify::{
    AlbumRef, Artist, ArtistRef, Followers, Playlist, PrivateUser, SpotifyApi, TimeRange, Track,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockSpotify {
    // Canned responses
    pub top_tracks: Mutex<Vec<Track>>,
    pub top_artists: Mutex<Vec<Artist>>,
    pub genre_seeds: Mutex<Vec<String>>,
    pub recommendations: Mutex<Vec<Track>>,
    /// Search results keyed by the exact query string
    pub search_results: Mutex<HashMap<String, Vec<Track>>>,

    // Recorded calls
    pub top_track_requests: Mutex<Vec<(TimeRange, u32)>>,
    pub searched_queries: Mutex<Vec<String>>,
    pub created_playlists: Mutex<Vec<Playlist>>,
    pub added_tracks: Mutex<Vec<(String, Vec<String>)>>,
    pub unfollowed: Mutex<Vec<String>>,

    vanished: Mutex<Vec<String>>,
    failing: AtomicBool,
    next_playlist: AtomicUsize,
}

impl MockSpotify {
    pub fn new() -> Self {
        Self {
            top_tracks: Mutex::new(Vec::new()),
            top_artists: Mutex::new(Vec::new()),
            genre_seeds: Mutex::new(Vec::new()),
            recommendations: Mutex::new(Vec::new()),
            search_results: Mutex::new(HashMap::new()),
            top_track_requests: Mutex::new(Vec::new()),
            searched_queries: Mutex::new(Vec::new()),
            created_playlists: Mutex::new(Vec::new()),
            added_tracks: Mutex::new(Vec::new()),
            unfollowed: Mutex::new(Vec::new()),
            vanished: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            next_playlist: AtomicUsize::new(1),
        }
    }

    /// Makes every following call fail as if the provider were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drops a playlist from the listing without going through the API,
    /// like a user deleting it in the provider's own app.
    pub fn vanish_playlist(&self, playlist_id: &str) {
        self.vanished.lock().unwrap().push(playlist_id.to_string());
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("scripted provider outage");
        }
        Ok(())
    }
}

#[async_trait]
impl SpotifyApi for MockSpotify {
    async fn get_me(&self, _access_token: &str) -> Result<PrivateUser> {
        self.check_available()?;
        Ok(PrivateUser {
            id: "mock-provider-account".to_string(),
            display_name: Some("Mock Listener".to_string()),
            email: None,
        })
    }

    async fn get_top_tracks(
        &self,
        _access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Track>> {
        self.check_available()?;
        self.top_track_requests
            .lock()
            .unwrap()
            .push((time_range, limit));
        let mut tracks = self.top_tracks.lock().unwrap().clone();
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn get_top_artists(
        &self,
        _access_token: &str,
        _time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Artist>> {
        self.check_available()?;
        let mut artists = self.top_artists.lock().unwrap().clone();
        artists.truncate(limit as usize);
        Ok(artists)
    }

    async fn get_available_genre_seeds(&self, _access_token: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.genre_seeds.lock().unwrap().clone())
    }

    async fn get_recommendations(
        &self,
        _access_token: &str,
        _seed_genres: &[String],
        limit: u32,
    ) -> Result<Vec<Track>> {
        self.check_available()?;
        let mut tracks = self.recommendations.lock().unwrap().clone();
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn search_tracks(
        &self,
        _access_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>> {
        self.check_available()?;
        self.searched_queries.lock().unwrap().push(query.to_string());
        let mut tracks = self
            .search_results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn get_my_playlists(&self, _access_token: &str) -> Result<Vec<Playlist>> {
        self.check_available()?;
        let unfollowed = self.unfollowed.lock().unwrap();
        let vanished = self.vanished.lock().unwrap();
        Ok(self
            .created_playlists
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !unfollowed.contains(&p.id) && !vanished.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_playlist(
        &self,
        _access_token: &str,
        _provider_user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist> {
        self.check_available()?;
        let n = self.next_playlist.fetch_add(1, Ordering::SeqCst);
        let playlist = Playlist {
            id: format!("mock-playlist-{}", n),
            name: name.to_string(),
            uri: format!("spotify:playlist:mock-playlist-{}", n),
            description: Some(description.to_string()),
            tracks_total: 0,
            images: vec![],
            external_url: None,
        };
        self.created_playlists.lock().unwrap().push(playlist.clone());
        Ok(playlist)
    }

    async fn add_tracks_to_playlist(
        &self,
        _access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()> {
        self.check_available()?;
        self.added_tracks
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_uris.to_vec()));
        Ok(())
    }

    async fn unfollow_playlist(&self, _access_token: &str, playlist_id: &str) -> Result<()> {
        self.check_available()?;
        self.unfollowed.lock().unwrap().push(playlist_id.to_string());
        Ok(())
    }
}

/// Builds a track with predictable ids and uris for assertions.
pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        uri: format!("spotify:track:{}", id),
        duration_ms: 180_000,
        popularity: Some(50),
        artists: vec![ArtistRef {
            id: "artist-1".to_string(),
            name: "Some Artist".to_string(),
        }],
        album: AlbumRef {
            id: "album-1".to_string(),
            name: "Some Album".to_string(),
            release_date: Some("1999-01-01".to_string()),
            images: vec![],
        },
    }
}

pub fn artist(id: &str, name: &str, genres: &[&str]) -> Artist {
    Artist {
        id: id.to_string(),
        name: name.to_string(),
        uri: format!("spotify:artist:{}", id),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        images: vec![],
        popularity: Some(70),
        followers: Some(Followers { total: 1234 }),
    }
}
