mod file_config;

pub use file_config::{FileConfig, SpotifyFileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub post_login_redirect: Option<String>,
    pub provider_timeout_sec: u64,
    pub session_retention_days: u64,
    pub session_prune_interval_hours: u64,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
}

/// Credentials and endpoints for the streaming provider.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Override for the accounts host, tests point this at a local server.
    pub accounts_base_url: Option<String>,
    /// Override for the Web API host.
    pub api_base_url: Option<String>,
}

/// Everything the server does on the user's behalf needs one of these.
pub fn default_scopes() -> Vec<String> {
    [
        "user-read-private",
        "user-read-email",
        "user-top-read",
        "playlist-read-private",
        "playlist-modify-private",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub post_login_redirect: String,
    pub provider_timeout_sec: u64,
    pub session_retention_days: u64,
    pub session_prune_interval_hours: u64,

    // Provider credentials; None runs the server without a login flow.
    pub spotify: Option<SpotifyConfig>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let post_login_redirect = file
            .post_login_redirect
            .or_else(|| cli.post_login_redirect.clone())
            .unwrap_or_else(|| "/".to_string());

        let provider_timeout_sec = file.provider_timeout_sec.unwrap_or(cli.provider_timeout_sec);
        let session_retention_days = file
            .session_retention_days
            .unwrap_or(cli.session_retention_days);
        let session_prune_interval_hours = file
            .session_prune_interval_hours
            .unwrap_or(cli.session_prune_interval_hours);

        let sp_file = file.spotify.unwrap_or_default();
        let client_id = sp_file.client_id.or_else(|| cli.spotify_client_id.clone());
        let client_secret = sp_file
            .client_secret
            .or_else(|| cli.spotify_client_secret.clone());
        let redirect_uri = sp_file
            .redirect_uri
            .or_else(|| cli.spotify_redirect_uri.clone());

        let spotify = match (client_id, client_secret, redirect_uri) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(SpotifyConfig {
                client_id,
                client_secret,
                redirect_uri,
                scopes: sp_file.scopes.unwrap_or_else(default_scopes),
                accounts_base_url: sp_file.accounts_base_url,
                api_base_url: sp_file.api_base_url,
            }),
            (None, None, None) => None,
            _ => bail!(
                "Spotify client_id, client_secret and redirect_uri must be provided together"
            ),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            post_login_redirect,
            provider_timeout_sec,
            session_retention_days,
            session_prune_interval_hours,
            spotify,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir.join("groovemate.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
