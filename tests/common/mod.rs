//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, ALICE_NAME, ALICE_SPOTIFY_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_profile() {
//!     let server = TestServer::spawn().await;
//!     let (_user_id, token) = server.seed_user(ALICE_SPOTIFY_ID, ALICE_NAME);
//!     let client = TestClient::authenticated(server.base_url.clone(), &token);
//!
//!     let response = client.get_me().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod mock;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;

// Builders for scripting the provider mock, reached through TestServer
#[allow(unused_imports)]
pub use mock::{artist, track};
