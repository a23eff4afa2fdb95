//! HTTP client for the provider's Web API.

use super::models::{Artist, Image, Playlist, PrivateUser, TimeRange, Track};
use super::SpotifyApi;
use crate::server::metrics::record_provider_api_call;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.spotify.com/v1";
const PLAYLIST_PAGE_SIZE: u32 = 50;

pub struct SpotifyClient {
    client: Client,
    api_base: String,
}

#[derive(Deserialize)]
struct TopItemsResponse<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<Track>,
}

#[derive(Deserialize)]
struct GenreSeedsResponse {
    genres: Vec<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Deserialize)]
struct SearchTracks {
    items: Vec<Track>,
}

#[derive(Deserialize)]
struct PlaylistPage {
    items: Vec<WirePlaylist>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct WirePlaylist {
    id: String,
    name: String,
    uri: String,
    description: Option<String>,
    tracks: Option<WireTracksRef>,
    // The provider sends an explicit null here for brand new playlists.
    images: Option<Vec<Image>>,
    external_urls: Option<WireExternalUrls>,
}

#[derive(Deserialize)]
struct WireTracksRef {
    total: u32,
}

#[derive(Deserialize)]
struct WireExternalUrls {
    spotify: Option<String>,
}

impl WirePlaylist {
    fn into_playlist(self) -> Playlist {
        Playlist {
            id: self.id,
            name: self.name,
            uri: self.uri,
            description: self.description,
            tracks_total: self.tracks.map(|t| t.total).unwrap_or(0),
            images: self.images.unwrap_or_default(),
            external_url: self.external_urls.and_then(|e| e.spotify),
        }
    }
}

impl SpotifyClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_api_base(API_BASE, timeout)
    }

    pub fn with_api_base(api_base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Send a request, check the status and keep the per-endpoint call
    /// counters up to date.
    async fn send_checked(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                record_provider_api_call(endpoint, false);
                return Err(err.into());
            }
        };

        if !response.status().is_success() {
            record_provider_api_call(endpoint, false);
            anyhow::bail!(
                "Provider call {} failed with status {}",
                endpoint,
                response.status()
            );
        }

        record_provider_api_call(endpoint, true);
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        access_token: &str,
        url: &str,
    ) -> Result<T> {
        let request = self.client.get(url).bearer_auth(access_token);
        let response = self.send_checked(endpoint, request).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn get_me(&self, access_token: &str) -> Result<PrivateUser> {
        let url = format!("{}/me", self.api_base);
        self.get_json("me", access_token, &url).await
    }

    async fn get_top_tracks(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Track>> {
        let url = format!(
            "{}/me/top/tracks?time_range={}&limit={}",
            self.api_base,
            time_range.as_str(),
            limit
        );
        let body: TopItemsResponse<Track> = self.get_json("top_tracks", access_token, &url).await?;
        Ok(body.items)
    }

    async fn get_top_artists(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Artist>> {
        let url = format!(
            "{}/me/top/artists?time_range={}&limit={}",
            self.api_base,
            time_range.as_str(),
            limit
        );
        let body: TopItemsResponse<Artist> =
            self.get_json("top_artists", access_token, &url).await?;
        Ok(body.items)
    }

    async fn get_available_genre_seeds(&self, access_token: &str) -> Result<Vec<String>> {
        let url = format!("{}/recommendations/available-genre-seeds", self.api_base);
        let body: GenreSeedsResponse = self.get_json("genre_seeds", access_token, &url).await?;
        Ok(body.genres)
    }

    async fn get_recommendations(
        &self,
        access_token: &str,
        seed_genres: &[String],
        limit: u32,
    ) -> Result<Vec<Track>> {
        let url = format!(
            "{}/recommendations?seed_genres={}&limit={}",
            self.api_base,
            urlencoding::encode(&seed_genres.join(",")),
            limit
        );
        let body: RecommendationsResponse =
            self.get_json("recommendations", access_token, &url).await?;
        Ok(body.tracks)
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>> {
        let url = format!(
            "{}/search?q={}&type=track&limit={}",
            self.api_base,
            urlencoding::encode(query),
            limit
        );
        let body: SearchResponse = self.get_json("search", access_token, &url).await?;
        Ok(body.tracks.items)
    }

    async fn get_my_playlists(&self, access_token: &str) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut offset = 0;
        loop {
            let url = format!(
                "{}/me/playlists?limit={}&offset={}",
                self.api_base, PLAYLIST_PAGE_SIZE, offset
            );
            let page: PlaylistPage = self.get_json("my_playlists", access_token, &url).await?;
            playlists.extend(page.items.into_iter().map(WirePlaylist::into_playlist));
            if page.next.is_none() {
                break;
            }
            offset += PLAYLIST_PAGE_SIZE;
        }
        Ok(playlists)
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        provider_user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist> {
        let url = format!(
            "{}/users/{}/playlists",
            self.api_base,
            urlencoding::encode(provider_user_id)
        );
        let request = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({
                "name": name,
                "description": description,
                "public": false,
            }));
        let response = self.send_checked("create_playlist", request).await?;

        let created: WirePlaylist = response.json().await?;
        Ok(created.into_playlist())
    }

    async fn add_tracks_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()> {
        let url = format!(
            "{}/playlists/{}/tracks",
            self.api_base,
            urlencoding::encode(playlist_id)
        );
        let request = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "uris": track_uris }));
        self.send_checked("add_tracks", request).await?;
        Ok(())
    }

    async fn unfollow_playlist(&self, access_token: &str, playlist_id: &str) -> Result<()> {
        let url = format!(
            "{}/playlists/{}/followers",
            self.api_base,
            urlencoding::encode(playlist_id)
        );
        let request = self.client.delete(&url).bearer_auth(access_token);
        self.send_checked("unfollow_playlist", request).await?;
        Ok(())
    }
}
