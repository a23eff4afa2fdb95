//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all groovemate-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::{RequestBuilder, Response};
use serde_json::json;
use std::time::Duration;

/// HTTP test client carrying an optional session token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    session_token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication behavior. For most tests,
    /// use `authenticated()` with a token from `TestServer::seed_user`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            session_token: None,
        }
    }

    /// Creates a client that sends the given session token on every request
    pub fn authenticated(base_url: String, session_token: &str) -> Self {
        let mut client = Self::new(base_url);
        client.session_token = Some(session_token.to_string());
        client
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_token {
            Some(token) => request.header("Authorization", token),
            None => request,
        }
    }

    // ========================================================================
    // Home
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// GET /v1/auth/login
    pub async fn login(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/auth/login", self.base_url)))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/auth/logout", self.base_url)))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /v1/auth/session
    pub async fn get_session(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/auth/session", self.base_url)))
            .send()
            .await
            .expect("Session request failed")
    }

    // ========================================================================
    // Profile Endpoints
    // ========================================================================

    /// GET /v1/me
    pub async fn get_me(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/me", self.base_url)))
            .send()
            .await
            .expect("Profile request failed")
    }

    /// PUT /v1/me/bio
    pub async fn update_bio(&self, bio: &str) -> Response {
        self.apply_auth(self.client.put(format!("{}/v1/me/bio", self.base_url)))
            .json(&json!({ "bio": bio }))
            .send()
            .await
            .expect("Bio update request failed")
    }

    /// DELETE /v1/me
    pub async fn delete_me(&self) -> Response {
        self.apply_auth(self.client.delete(format!("{}/v1/me", self.base_url)))
            .send()
            .await
            .expect("Account deletion request failed")
    }

    // ========================================================================
    // Listening Stats Endpoints
    // ========================================================================

    /// GET /v1/stats/top-tracks
    pub async fn get_top_tracks(&self, time_range: Option<&str>, limit: Option<u32>) -> Response {
        let mut request = self
            .client
            .get(format!("{}/v1/stats/top-tracks", self.base_url));
        if let Some(time_range) = time_range {
            request = request.query(&[("time_range", time_range)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        self.apply_auth(request)
            .send()
            .await
            .expect("Top tracks request failed")
    }

    /// GET /v1/stats/top-artists
    pub async fn get_top_artists(&self, time_range: Option<&str>, limit: Option<u32>) -> Response {
        let mut request = self
            .client
            .get(format!("{}/v1/stats/top-artists", self.base_url));
        if let Some(time_range) = time_range {
            request = request.query(&[("time_range", time_range)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        self.apply_auth(request)
            .send()
            .await
            .expect("Top artists request failed")
    }

    // ========================================================================
    // Playlist Endpoints
    // ========================================================================

    /// GET /v1/playlists
    pub async fn get_playlists(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/playlists", self.base_url)))
            .send()
            .await
            .expect("Playlists request failed")
    }

    /// GET /v1/playlists/genres
    pub async fn get_genre_seeds(&self) -> Response {
        self.apply_auth(
            self.client
                .get(format!("{}/v1/playlists/genres", self.base_url)),
        )
        .send()
        .await
        .expect("Genre seeds request failed")
    }

    /// POST /v1/playlists/recommendations
    pub async fn generate_from_genres(&self, genres: &[&str], limit: Option<u32>) -> Response {
        self.apply_auth(
            self.client
                .post(format!("{}/v1/playlists/recommendations", self.base_url)),
        )
        .json(&json!({ "genres": genres, "recco_limit": limit }))
        .send()
        .await
        .expect("Genre generation request failed")
    }

    /// POST /v1/playlists/search
    pub async fn generate_from_decades(&self, decades: &[i32], limit: Option<u32>) -> Response {
        self.apply_auth(
            self.client
                .post(format!("{}/v1/playlists/search", self.base_url)),
        )
        .json(&json!({ "decades": decades, "search_limit": limit }))
        .send()
        .await
        .expect("Decade generation request failed")
    }

    /// DELETE /v1/playlists/{id}
    pub async fn delete_playlist(&self, id: &str) -> Response {
        self.apply_auth(
            self.client
                .delete(format!("{}/v1/playlists/{}", self.base_url, id)),
        )
        .send()
        .await
        .expect("Playlist deletion request failed")
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/users
    pub async fn get_users(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/users", self.base_url)))
            .send()
            .await
            .expect("Users request failed")
    }

    /// GET /v1/users/{id}
    pub async fn get_user(&self, id: usize) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/users/{}", self.base_url, id)))
            .send()
            .await
            .expect("User request failed")
    }

    /// GET /v1/users/{id}/comments
    pub async fn get_user_comments(&self, id: usize) -> Response {
        self.apply_auth(
            self.client
                .get(format!("{}/v1/users/{}/comments", self.base_url, id)),
        )
        .send()
        .await
        .expect("Comments request failed")
    }

    /// POST /v1/users/{id}/comments
    pub async fn post_user_comment(&self, id: usize, text: &str) -> Response {
        self.apply_auth(
            self.client
                .post(format!("{}/v1/users/{}/comments", self.base_url, id)),
        )
        .json(&json!({ "text": text }))
        .send()
        .await
        .expect("Comment creation request failed")
    }

    // ========================================================================
    // Friend Endpoints
    // ========================================================================

    /// GET /v1/friends
    pub async fn get_friends(&self) -> Response {
        self.apply_auth(self.client.get(format!("{}/v1/friends", self.base_url)))
            .send()
            .await
            .expect("Friends request failed")
    }

    /// POST /v1/friends
    pub async fn add_friend(&self, user_id: usize) -> Response {
        self.apply_auth(self.client.post(format!("{}/v1/friends", self.base_url)))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .expect("Friend creation request failed")
    }

    /// DELETE /v1/friends/{user_id}
    pub async fn remove_friend(&self, user_id: usize) -> Response {
        self.apply_auth(
            self.client
                .delete(format!("{}/v1/friends/{}", self.base_url, user_id)),
        )
        .send()
        .await
        .expect("Friend removal request failed")
    }
}
