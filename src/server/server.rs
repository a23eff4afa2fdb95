use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{error, info};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, response, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{log_requests, metrics, session, state::*, RequestsLoggingLevel, ServerConfig};
use crate::playlists::{GeneratedPlaylist, PlaylistError, PlaylistManager};
use crate::server::session::Session;
use crate::spotify::{
    Artist, AuthStateStore, SpotifyApi, SpotifyAuthClient, TimeRange, TokenKeeper, Track,
};
use crate::store::{Comment, FullStore, SessionTokenValue, StoredPlaylist, User};
use crate::user::UserManager;

const MAX_BIO_LENGTH: usize = 512;
const MAX_COMMENT_LENGTH: usize = 1000;
const DEFAULT_TOP_ITEMS_LIMIT: u32 = 20;
const MAX_TOP_ITEMS_LIMIT: u32 = 50;

#[derive(Serialize)]
struct ServerStats {
    pub server: &'static str,
    pub version: &'static str,
    pub hash: String,
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UpdateBioBody {
    pub bio: String,
}

#[derive(Deserialize, Debug)]
struct TopItemsQuery {
    pub time_range: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct GenerateFromGenresBody {
    pub genres: Vec<String>,
    pub recco_limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct GenerateFromDecadesBody {
    pub decades: Vec<i32>,
    pub search_limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct CreateCommentBody {
    pub text: String,
}

#[derive(Deserialize, Debug)]
struct AddFriendBody {
    pub user_id: usize,
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn bad_gateway(context: &str, err: anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    json_message(
        StatusCode::BAD_GATEWAY,
        "Could not reach the streaming provider",
    )
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(session::COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
        .same_site(SameSite::Lax)
        .build()
}

/// 200 response that also expires the session cookie.
fn session_ending_response() -> Response {
    response::Builder::new()
        .status(StatusCode::OK)
        .header(header::SET_COOKIE, expired_session_cookie().to_string())
        .body(Body::empty())
        .unwrap()
}

async fn provider_access_token(state: &ServerState, user_id: usize) -> Result<String, Response> {
    match state.token_keeper.access_token_for(user_id).await {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(json_message(
            StatusCode::UNAUTHORIZED,
            "No provider credentials for this account, log in again",
        )),
        Err(err) => Err(bad_gateway("Failed to obtain a provider access token", err)),
    }
}

fn load_session_user(state: &ServerState, user_id: usize) -> Result<User, Response> {
    match state.store.get_user(user_id) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(StatusCode::FORBIDDEN.into_response()),
        Err(err) => Err(internal_error("Failed to load the session user", err)),
    }
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "user_id": user.id,
        "spotify_id": user.spotify_id,
        "display_name": user.display_name,
        "bio": user.bio,
        "created": unix_seconds(user.created),
    })
}

fn user_listing_json(user: &User) -> serde_json::Value {
    json!({
        "user_id": user.id,
        "spotify_id": user.spotify_id,
        "display_name": user.display_name,
        "bio": user.bio,
    })
}

fn playlist_json(playlist: &StoredPlaylist) -> serde_json::Value {
    json!({
        "id": playlist.id,
        "uri": playlist.uri,
        "name": playlist.name,
        "kind": playlist.kind,
        "seeds": playlist.seeds,
        "created": unix_seconds(playlist.created),
    })
}

fn comment_json(comment: &Comment) -> serde_json::Value {
    json!({
        "id": comment.id,
        "author_id": comment.author_id,
        "author_name": comment.author_name,
        "text": comment.text,
        "created": unix_seconds(comment.created),
    })
}

fn track_json(track: &Track) -> serde_json::Value {
    json!({
        "id": track.id,
        "name": track.name,
        "uri": track.uri,
        "artists": track.artists.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
        "album": track.album.name,
        "duration_ms": track.duration_ms,
        "popularity": track.popularity,
    })
}

fn artist_json(artist: &Artist) -> serde_json::Value {
    json!({
        "id": artist.id,
        "name": artist.name,
        "genres": artist.genres,
        "popularity": artist.popularity,
        "followers": artist.followers.as_ref().map(|f| f.total).unwrap_or(0),
    })
}

fn playlist_error_response(err: PlaylistError) -> Response {
    match err {
        PlaylistError::Invalid(message) => json_message(StatusCode::BAD_REQUEST, &message),
        PlaylistError::NoTracks => {
            json_message(StatusCode::NOT_FOUND, "No tracks matched the given seeds")
        }
        PlaylistError::Provider(err) => bad_gateway("Provider call failed", err),
        PlaylistError::Store(err) => internal_error("Playlist store operation failed", err),
    }
}

fn created_playlist_response(generated: &GeneratedPlaylist) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({
            "message": format!(
                "Created playlist {} with {} tracks",
                generated.playlist.name, generated.track_count
            ),
            "playlist": generated.playlist,
        })),
    )
        .into_response()
}

fn resolve_top_items_query(query: &TopItemsQuery) -> Result<(TimeRange, u32), Response> {
    let time_range = match &query.time_range {
        None => TimeRange::default(),
        Some(raw) => match TimeRange::parse(raw) {
            Some(range) => range,
            None => {
                return Err(json_message(
                    StatusCode::BAD_REQUEST,
                    "time_range must be one of short_term, medium_term, long_term",
                ))
            }
        },
    };

    let limit = query.limit.unwrap_or(DEFAULT_TOP_ITEMS_LIMIT);
    if !(1..=MAX_TOP_ITEMS_LIMIT).contains(&limit) {
        return Err(json_message(
            StatusCode::BAD_REQUEST,
            &format!("limit must be between 1 and {}", MAX_TOP_ITEMS_LIMIT),
        ));
    }

    Ok((time_range, limit))
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        server: "groovemate-server",
        version: env!("CARGO_PKG_VERSION"),
        hash: state.hash.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
    };
    Json(stats)
}

async fn auth_login(State(state): State<ServerState>) -> Response {
    let client = match &state.auth_client {
        Some(client) => client.clone(),
        None => {
            return json_message(
                StatusCode::SERVICE_UNAVAILABLE,
                "Login is not configured on this server",
            )
        }
    };

    let (url, auth_state) = client.authorize_url();
    state.auth_state_store.store(auth_state).await;
    Redirect::temporary(&url).into_response()
}

async fn auth_callback(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let client = match &state.auth_client {
        Some(client) => client.clone(),
        None => {
            return json_message(
                StatusCode::SERVICE_UNAVAILABLE,
                "Login is not configured on this server",
            )
        }
    };

    if let Some(provider_error) = query.error {
        metrics::record_login_attempt("failure");
        return json_message(
            StatusCode::BAD_REQUEST,
            &format!("The provider rejected the login: {}", provider_error),
        );
    }

    let (code, csrf_token) = match (query.code, query.state) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            metrics::record_login_attempt("failure");
            return json_message(StatusCode::BAD_REQUEST, "Missing code or state parameter");
        }
    };

    let stored_state = match state.auth_state_store.take(&csrf_token).await {
        Some(stored) => stored,
        None => {
            metrics::record_login_attempt("failure");
            return json_message(
                StatusCode::BAD_REQUEST,
                "Unknown or already used authorization state",
            );
        }
    };

    if stored_state.is_expired() {
        metrics::record_login_attempt("failure");
        return json_message(StatusCode::BAD_REQUEST, "The authorization state has expired");
    }

    let token_set = match client.exchange_code(&code, &csrf_token, &stored_state).await {
        Ok(set) => set,
        Err(err) => {
            metrics::record_login_attempt("failure");
            return bad_gateway("Code exchange with the provider failed", err);
        }
    };

    let profile = match state.spotify.get_me(&token_set.access_token).await {
        Ok(profile) => profile,
        Err(err) => {
            metrics::record_login_attempt("failure");
            return bad_gateway("Failed to fetch the provider profile", err);
        }
    };

    let (user_id, registered) = match state.user_manager.resolve_login(&profile) {
        Ok(x) => x,
        Err(err) => {
            metrics::record_login_attempt("failure");
            return internal_error("Failed to resolve the logged-in user", err);
        }
    };
    if registered {
        info!("Registered new user {} ({})", user_id, profile.id);
    }

    if let Err(err) = state.token_keeper.store_exchanged(user_id, &token_set) {
        metrics::record_login_attempt("failure");
        return internal_error("Failed to store provider tokens", err);
    }

    let session_token = match state.user_manager.start_session(user_id) {
        Ok(token) => token,
        Err(err) => {
            metrics::record_login_attempt("failure");
            return internal_error("Failed to create a session", err);
        }
    };

    metrics::record_login_attempt("success");

    let cookie = Cookie::build((session::COOKIE_SESSION_TOKEN_KEY, session_token.value.0))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    (
        jar.add(cookie),
        Redirect::to(&state.config.post_login_redirect),
    )
        .into_response()
}

async fn auth_logout(State(state): State<ServerState>, session: Session) -> Response {
    match state
        .user_manager
        .end_session(&SessionTokenValue(session.token))
    {
        Ok(_) => session_ending_response(),
        Err(err) => internal_error("Failed to end the session", err),
    }
}

async fn auth_session(State(state): State<ServerState>, session: Session) -> Response {
    let user = match load_session_user(&state, session.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };
    Json(json!({
        "user_id": user.id,
        "spotify_id": user.spotify_id,
        "display_name": user.display_name,
    }))
    .into_response()
}

async fn get_me(session: Session, State(store): State<GuardedStore>) -> Response {
    match store.get_user(session.user_id) {
        Ok(Some(user)) => Json(user_json(&user)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("Failed to load the user profile", err),
    }
}

async fn put_bio(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<UpdateBioBody>,
) -> Response {
    if body.bio.chars().count() > MAX_BIO_LENGTH {
        return json_message(
            StatusCode::BAD_REQUEST,
            &format!("Bio must be at most {} characters", MAX_BIO_LENGTH),
        );
    }
    match store.update_user_bio(session.user_id, &body.bio) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => internal_error("Failed to update the bio", err),
    }
}

async fn delete_me(State(state): State<ServerState>, session: Session) -> Response {
    match state.user_manager.delete_account(session.user_id) {
        Ok(()) => session_ending_response(),
        Err(err) => internal_error("Failed to delete the account", err),
    }
}

async fn get_top_tracks(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<TopItemsQuery>,
) -> Response {
    let (time_range, limit) = match resolve_top_items_query(&query) {
        Ok(x) => x,
        Err(response) => return response,
    };
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state
        .spotify
        .get_top_tracks(&access_token, time_range, limit)
        .await
    {
        Ok(tracks) => {
            let items: Vec<serde_json::Value> = tracks.iter().map(track_json).collect();
            Json(json!({ "items": items })).into_response()
        }
        Err(err) => bad_gateway("Failed to fetch top tracks", err),
    }
}

async fn get_top_artists(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<TopItemsQuery>,
) -> Response {
    let (time_range, limit) = match resolve_top_items_query(&query) {
        Ok(x) => x,
        Err(response) => return response,
    };
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state
        .spotify
        .get_top_artists(&access_token, time_range, limit)
        .await
    {
        Ok(artists) => {
            let items: Vec<serde_json::Value> = artists.iter().map(artist_json).collect();
            Json(json!({ "items": items })).into_response()
        }
        Err(err) => bad_gateway("Failed to fetch top artists", err),
    }
}

async fn get_playlists(session: Session, State(state): State<ServerState>) -> Response {
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state
        .playlist_manager
        .list_for_user(&access_token, session.user_id)
        .await
    {
        Ok(playlists) => {
            let playlists: Vec<serde_json::Value> = playlists.iter().map(playlist_json).collect();
            Json(json!({ "playlists": playlists })).into_response()
        }
        Err(err) => playlist_error_response(err),
    }
}

async fn get_genre_seeds(session: Session, State(state): State<ServerState>) -> Response {
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state.spotify.get_available_genre_seeds(&access_token).await {
        Ok(genres) => Json(json!({ "genres": genres })).into_response(),
        Err(err) => bad_gateway("Failed to fetch genre seeds", err),
    }
}

async fn post_recommendations(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<GenerateFromGenresBody>,
) -> Response {
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };
    let user = match load_session_user(&state, session.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state
        .playlist_manager
        .generate_from_genres(
            &access_token,
            session.user_id,
            &user.spotify_id,
            &body.genres,
            body.recco_limit,
        )
        .await
    {
        Ok(generated) => {
            metrics::record_playlist_generated("genres");
            created_playlist_response(&generated)
        }
        Err(err) => playlist_error_response(err),
    }
}

async fn post_search(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<GenerateFromDecadesBody>,
) -> Response {
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };
    let user = match load_session_user(&state, session.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state
        .playlist_manager
        .generate_from_decades(
            &access_token,
            session.user_id,
            &user.spotify_id,
            &body.decades,
            body.search_limit,
        )
        .await
    {
        Ok(generated) => {
            metrics::record_playlist_generated("decades");
            created_playlist_response(&generated)
        }
        Err(err) => playlist_error_response(err),
    }
}

async fn delete_playlist(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    let access_token = match provider_access_token(&state, session.user_id).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state
        .playlist_manager
        .delete(&access_token, session.user_id, &id)
        .await
    {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => playlist_error_response(err),
    }
}

async fn get_users(_session: Session, State(store): State<GuardedStore>) -> Response {
    match store.get_all_users() {
        Ok(users) => {
            let users: Vec<serde_json::Value> = users.iter().map(user_listing_json).collect();
            Json(json!({ "users": users })).into_response()
        }
        Err(err) => internal_error("Failed to list users", err),
    }
}

async fn get_user(
    session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<usize>,
) -> Response {
    let user = match store.get_user(id) {
        Ok(Some(user)) => user,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load the user", err),
    };
    let is_friend = match store.are_friends(session.user_id, id) {
        Ok(x) => x,
        Err(err) => return internal_error("Failed to check the friendship", err),
    };

    let mut profile = user_json(&user);
    profile["is_friend"] = json!(is_friend);
    Json(profile).into_response()
}

async fn get_user_comments(
    _session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<usize>,
) -> Response {
    match store.get_user(id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load the user", err),
    }

    match store.get_comments_for_user(id) {
        Ok(comments) => {
            let comments: Vec<serde_json::Value> = comments.iter().map(comment_json).collect();
            Json(json!({ "comments": comments })).into_response()
        }
        Err(err) => internal_error("Failed to load comments", err),
    }
}

async fn post_user_comment(
    session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<usize>,
    Json(body): Json<CreateCommentBody>,
) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return json_message(StatusCode::BAD_REQUEST, "Comment text must not be empty");
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return json_message(
            StatusCode::BAD_REQUEST,
            &format!(
                "Comment text must be at most {} characters",
                MAX_COMMENT_LENGTH
            ),
        );
    }

    match store.get_user(id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load the user", err),
    }

    match store.add_comment(session.user_id, id, text) {
        Ok(comment) => (StatusCode::CREATED, Json(comment_json(&comment))).into_response(),
        Err(err) => internal_error("Failed to store the comment", err),
    }
}

async fn get_friends(session: Session, State(store): State<GuardedStore>) -> Response {
    match store.get_friends(session.user_id) {
        Ok(friends) => {
            let friends: Vec<serde_json::Value> = friends.iter().map(user_listing_json).collect();
            Json(json!({ "friends": friends })).into_response()
        }
        Err(err) => internal_error("Failed to list friends", err),
    }
}

async fn post_friend(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<AddFriendBody>,
) -> Response {
    if body.user_id == session.user_id {
        return json_message(StatusCode::BAD_REQUEST, "Cannot befriend yourself");
    }

    match store.get_user(body.user_id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load the user", err),
    }

    match store.add_friendship(session.user_id, body.user_id) {
        Ok(true) => StatusCode::CREATED.into_response(),
        Ok(false) => json_message(StatusCode::CONFLICT, "Already friends"),
        Err(err) => internal_error("Failed to store the friendship", err),
    }
}

async fn delete_friend(
    session: Session,
    State(store): State<GuardedStore>,
    Path(user_id): Path<usize>,
) -> Response {
    match store.delete_friendship(session.user_id, user_id) {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("Failed to delete the friendship", err),
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        store: Arc<dyn FullStore>,
        spotify: Arc<dyn SpotifyApi>,
        auth_client: Option<Arc<SpotifyAuthClient>>,
        auth_state_store: Arc<AuthStateStore>,
    ) -> ServerState {
        let user_manager = Arc::new(UserManager::new(store.clone()));
        let playlist_manager = Arc::new(PlaylistManager::new(store.clone(), spotify.clone()));
        let token_keeper = Arc::new(TokenKeeper::new(store.clone(), auth_client.clone()));
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            spotify,
            user_manager,
            playlist_manager,
            token_keeper,
            auth_client,
            auth_state_store,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    spotify: Arc<dyn SpotifyApi>,
    auth_client: Option<Arc<SpotifyAuthClient>>,
    auth_state_store: Arc<AuthStateStore>,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), store, spotify, auth_client, auth_state_store);

    let auth_routes: Router = Router::new()
        .route("/login", get(auth_login))
        .route("/callback", get(auth_callback))
        .route("/logout", get(auth_logout))
        .route("/session", get(auth_session))
        .with_state(state.clone());

    let me_routes: Router = Router::new()
        .route("/", get(get_me))
        .route("/", delete(delete_me))
        .route("/bio", put(put_bio))
        .with_state(state.clone());

    let stats_routes: Router = Router::new()
        .route("/top-tracks", get(get_top_tracks))
        .route("/top-artists", get(get_top_artists))
        .with_state(state.clone());

    let playlist_routes: Router = Router::new()
        .route("/", get(get_playlists))
        .route("/genres", get(get_genre_seeds))
        .route("/recommendations", post(post_recommendations))
        .route("/search", post(post_search))
        .route("/{id}", delete(delete_playlist))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/", get(get_users))
        .route("/{id}", get(get_user))
        .route("/{id}/comments", get(get_user_comments))
        .route("/{id}/comments", post(post_user_comment))
        .with_state(state.clone());

    let friend_routes: Router = Router::new()
        .route("/", get(get_friends))
        .route("/", post(post_friend))
        .route("/{user_id}", delete(delete_friend))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/me", me_routes)
        .nest("/v1/stats", stats_routes)
        .nest("/v1/playlists", playlist_routes)
        .nest("/v1/users", user_routes)
        .nest("/v1/friends", friend_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_server(
    store: Arc<dyn FullStore>,
    spotify: Arc<dyn SpotifyApi>,
    auth_client: Option<Arc<SpotifyAuthClient>>,
    auth_state_store: Arc<AuthStateStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    metrics_port: u16,
    frontend_dir_path: Option<String>,
    post_login_redirect: String,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
        post_login_redirect,
    };
    let app = make_app(config, store, spotify, auth_client, auth_state_store)?;

    tokio::spawn(async move {
        if let Err(err) = metrics::run_metrics_server(metrics_port).await {
            error!("Metrics server failed: {:#}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
