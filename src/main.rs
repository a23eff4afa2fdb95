use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use groovemate_server::config;
use groovemate_server::server::{metrics, run_server, RequestsLoggingLevel};
use groovemate_server::spotify::{AuthStateStore, SpotifyApi, SpotifyAuthClient, SpotifyClient};
use groovemate_server::store::{SessionTokenStore, SqliteStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the database file (groovemate.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Where to send the browser after a completed login.
    #[clap(long)]
    pub post_login_redirect: Option<String>,

    /// Timeout in seconds for streaming provider requests.
    #[clap(long, default_value_t = 10)]
    pub provider_timeout_sec: u64,

    /// Number of days to retain unused session tokens. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub session_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if session_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub session_prune_interval_hours: u64,

    /// OAuth client id issued by the streaming provider.
    #[clap(long)]
    pub spotify_client_id: Option<String>,

    /// OAuth client secret issued by the streaming provider.
    #[clap(long)]
    pub spotify_client_secret: Option<String>,

    /// Redirect URI registered with the streaming provider.
    #[clap(long)]
    pub spotify_redirect_uri: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            post_login_redirect: args.post_login_redirect.clone(),
            provider_timeout_sec: args.provider_timeout_sec,
            session_retention_days: args.session_retention_days,
            session_prune_interval_hours: args.session_prune_interval_hours,
            spotify_client_id: args.spotify_client_id.clone(),
            spotify_client_secret: args.spotify_client_secret.clone(),
            spotify_redirect_uri: args.spotify_redirect_uri.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);

    // Create the store (will create DB if not exists)
    if !app_config.db_path().exists() {
        info!("Creating new database at {:?}", app_config.db_path());
    }
    let store = Arc::new(SqliteStore::new(app_config.db_path())?);

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();

    // Provider Web API client
    let provider_timeout = Duration::from_secs(app_config.provider_timeout_sec);
    let api_base_override = app_config
        .spotify
        .as_ref()
        .and_then(|s| s.api_base_url.clone());
    let spotify: Arc<dyn SpotifyApi> = match api_base_override {
        Some(base) => Arc::new(SpotifyClient::with_api_base(&base, provider_timeout)?),
        None => Arc::new(SpotifyClient::new(provider_timeout)?),
    };

    // Provider OAuth client; without credentials the login flow is disabled
    let auth_client = match &app_config.spotify {
        Some(spotify_config) => Some(Arc::new(SpotifyAuthClient::new(spotify_config)?)),
        None => {
            info!("No Spotify credentials configured, the login flow is disabled");
            None
        }
    };

    let auth_state_store = Arc::new(AuthStateStore::new());

    // Sweep expired authorization states every minute
    let sweeping_state_store = auth_state_store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweeping_state_store.cleanup_expired().await;
        }
    });

    // Spawn background task for session token pruning if enabled
    if app_config.session_retention_days > 0 {
        let retention_days = app_config.session_retention_days;
        let interval_hours = app_config.session_prune_interval_hours;
        let pruning_store = store.clone();

        info!(
            "Session pruning enabled: retaining {} days, pruning every {} hours",
            retention_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match pruning_store.prune_unused_session_tokens(retention_days) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} stale session tokens", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune session tokens: {}", e);
                    }
                }
            }
        });
    }

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    run_server(
        store,
        spotify,
        auth_client,
        auth_state_store,
        app_config.logging_level.clone(),
        app_config.port,
        app_config.metrics_port,
        app_config.frontend_dir_path.clone(),
        app_config.post_login_redirect.clone(),
    )
    .await
}
