//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user identities, timeouts, etc.),
//! update only this file.

// ============================================================================
// Test Users
// ============================================================================

/// Provider account id of the primary test user
pub const ALICE_SPOTIFY_ID: &str = "spotify-alice";

/// Display name of the primary test user
pub const ALICE_NAME: &str = "Alice";

/// Provider account id of the secondary test user
pub const BOB_SPOTIFY_ID: &str = "spotify-bob";

/// Display name of the secondary test user
pub const BOB_NAME: &str = "Bob";

/// Provider account id of the spare test user
pub const CARLA_SPOTIFY_ID: &str = "spotify-carla";

/// Display name of the spare test user
pub const CARLA_NAME: &str = "Carla";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
