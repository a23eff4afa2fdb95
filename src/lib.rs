//! Groovemate Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod playlists;
pub mod server;
pub mod spotify;
pub mod sqlite_persistence;
pub mod store;
pub mod user;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use spotify::{SpotifyApi, SpotifyClient};
pub use store::{FullStore, SqliteStore};
