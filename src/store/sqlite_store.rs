use super::models::{
    Comment, PlaylistKind, ProviderTokens, SessionToken, SessionTokenValue, StoredPlaylist, User,
};
use super::{PlaylistStore, ProviderTokenStore, SessionTokenStore, SocialStore, UserStore};
use crate::sqlite_persistence::{
    self, ColumnDef, OnDelete, SchemaVersion, SqlType, TableDef, EPOCH_NOW,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// V 0
const USER_TABLE_V0: TableDef = TableDef {
    name: "user",
    columns: &[
        ColumnDef::new("id", SqlType::Integer).primary_key(),
        ColumnDef::new("spotify_id", SqlType::Text).not_null(),
        ColumnDef::new("display_name", SqlType::Text).not_null(),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
    ],
    indices: &[],
    unique_sets: &[&["spotify_id"]],
};

const SESSION_TOKEN_TABLE_V0: TableDef = TableDef {
    name: "session_token",
    columns: &[
        ColumnDef::new("value", SqlType::Text).primary_key().not_null(),
        ColumnDef::new("user_id", SqlType::Integer)
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
        ColumnDef::new("last_used", SqlType::Integer),
    ],
    indices: &[("idx_session_token_user_id", "user_id")],
    unique_sets: &[],
};

const PROVIDER_TOKEN_TABLE_V0: TableDef = TableDef {
    name: "provider_token",
    columns: &[
        ColumnDef::new("user_id", SqlType::Integer)
            .primary_key()
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("access_token", SqlType::Text).not_null(),
        ColumnDef::new("refresh_token", SqlType::Text).not_null(),
        ColumnDef::new("expires_at", SqlType::Integer).not_null(),
        ColumnDef::new("updated", SqlType::Integer).default_sql(EPOCH_NOW),
    ],
    indices: &[],
    unique_sets: &[],
};

const PLAYLIST_TABLE_V0: TableDef = TableDef {
    name: "playlist",
    columns: &[
        ColumnDef::new("id", SqlType::Text).primary_key().not_null(),
        ColumnDef::new("user_id", SqlType::Integer)
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("uri", SqlType::Text).not_null(),
        ColumnDef::new("name", SqlType::Text).not_null(),
        ColumnDef::new("kind", SqlType::Integer),
        ColumnDef::new("seeds", SqlType::Text),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
    ],
    indices: &[("idx_playlist_user_id", "user_id")],
    unique_sets: &[],
};

const FRIENDSHIP_TABLE_V0: TableDef = TableDef {
    name: "friendship",
    columns: &[
        ColumnDef::new("user_id", SqlType::Integer)
            .primary_key()
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("friend_id", SqlType::Integer)
            .primary_key()
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
    ],
    indices: &[("idx_friendship_friend_id", "friend_id")],
    unique_sets: &[],
};

const COMMENT_TABLE_V0: TableDef = TableDef {
    name: "comment",
    columns: &[
        ColumnDef::new("id", SqlType::Integer).primary_key(),
        ColumnDef::new("author_id", SqlType::Integer)
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("recipient_id", SqlType::Integer)
            .not_null()
            .references("user", "id", OnDelete::Cascade),
        ColumnDef::new("text", SqlType::Text).not_null(),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
    ],
    indices: &[("idx_comment_recipient_id", "recipient_id")],
    unique_sets: &[],
};

/// V 1, user grows a profile bio. ALTER TABLE appends, so the column
/// sits after created.
const USER_TABLE_V1: TableDef = TableDef {
    name: "user",
    columns: &[
        ColumnDef::new("id", SqlType::Integer).primary_key(),
        ColumnDef::new("spotify_id", SqlType::Text).not_null(),
        ColumnDef::new("display_name", SqlType::Text).not_null(),
        ColumnDef::new("created", SqlType::Integer).default_sql(EPOCH_NOW),
        ColumnDef::new("bio", SqlType::Text).not_null().default_sql("''"),
    ],
    indices: &[],
    unique_sets: &[&["spotify_id"]],
};

pub const VERSIONED_SCHEMAS: &[SchemaVersion] = &[
    SchemaVersion {
        version: 0,
        tables: &[
            USER_TABLE_V0,
            SESSION_TOKEN_TABLE_V0,
            PROVIDER_TOKEN_TABLE_V0,
            PLAYLIST_TABLE_V0,
            FRIENDSHIP_TABLE_V0,
            COMMENT_TABLE_V0,
        ],
        migration: None,
    },
    SchemaVersion {
        version: 1,
        tables: &[
            USER_TABLE_V1,
            SESSION_TOKEN_TABLE_V0,
            PROVIDER_TOKEN_TABLE_V0,
            PLAYLIST_TABLE_V0,
            FRIENDSHIP_TABLE_V0,
            COMMENT_TABLE_V0,
        ],
        migration: Some(|conn: &Connection| {
            conn.execute(
                "ALTER TABLE user ADD COLUMN bio TEXT NOT NULL DEFAULT ''",
                [],
            )?;
            Ok(())
        }),
    },
];

fn system_time_from_epoch(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value as u64)
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = sqlite_persistence::open_or_create(db_path, VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            spotify_id: row.get(1)?,
            display_name: row.get(2)?,
            bio: row.get(3)?,
            created: system_time_from_epoch(row.get(4)?),
        })
    }

    fn row_to_playlist(row: &rusqlite::Row) -> rusqlite::Result<StoredPlaylist> {
        let kind = row
            .get::<_, Option<i64>>(4)?
            .and_then(|v| PlaylistKind::from_int(v as i32));
        let seeds = row
            .get::<_, Option<String>>(5)?
            .map(|s| serde_json::from_str(&s).unwrap_or_default())
            .unwrap_or_default();
        Ok(StoredPlaylist {
            id: row.get(0)?,
            user_id: row.get(1)?,
            uri: row.get(2)?,
            name: row.get(3)?,
            kind,
            seeds,
            created: system_time_from_epoch(row.get(6)?),
        })
    }

    fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            author_id: row.get(1)?,
            author_name: row.get(2)?,
            recipient_id: row.get(3)?,
            text: row.get(4)?,
            created: system_time_from_epoch(row.get(5)?),
        })
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, spotify_id: &str, display_name: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user (spotify_id, display_name) VALUES (?1, ?2)",
            params![spotify_id, display_name],
        )
        .with_context(|| format!("Failed to create user for account {}", spotify_id))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, spotify_id, display_name, bio, created FROM user WHERE id = ?1")?;
        let user = stmt
            .query_row(params![user_id], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    fn get_user_id_by_spotify_id(&self, spotify_id: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM user WHERE spotify_id = ?1")?;
        let id = stmt
            .query_row(params![spotify_id], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, spotify_id, display_name, bio, created FROM user ORDER BY display_name",
        )?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn update_user_display_name(&self, user_id: usize, display_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user SET display_name = ?1 WHERE id = ?2",
            params![display_name, user_id],
        )?;
        Ok(())
    }

    fn update_user_bio(&self, user_id: usize, bio: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user SET bio = ?1 WHERE id = ?2",
            params![bio, user_id],
        )?;
        Ok(())
    }

    fn delete_user(&self, user_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM user WHERE id = ?1", params![user_id])?;
        Ok(())
    }
}

impl SessionTokenStore for SqliteStore {
    fn add_session_token(&self, token: SessionToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO session_token (value, user_id) VALUES (?1, ?2)",
            params![token.value.0, token.user_id],
        )?;
        Ok(())
    }

    fn get_session_token(&self, value: &SessionTokenValue) -> Result<Option<SessionToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT value, user_id, created, last_used FROM session_token WHERE value = ?1",
        )?;
        let token = stmt
            .query_row(params![value.0], |row| {
                Ok(SessionToken {
                    value: SessionTokenValue(row.get(0)?),
                    user_id: row.get(1)?,
                    created: system_time_from_epoch(row.get(2)?),
                    last_used: row
                        .get::<_, Option<i64>>(3)?
                        .map(system_time_from_epoch),
                })
            })
            .optional()?;
        Ok(token)
    }

    fn delete_session_token(&self, value: &SessionTokenValue) -> Result<Option<SessionToken>> {
        let Some(token) = self.get_session_token(value)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM session_token WHERE value = ?1",
            params![value.0],
        )?;
        Ok(Some(token))
    }

    fn update_session_token_last_used_timestamp(&self, value: &SessionTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE session_token SET last_used = cast(strftime('%s','now') as int) WHERE value = ?1",
            params![value.0],
        )?;
        Ok(())
    }

    fn prune_unused_session_tokens(&self, unused_for_days: u64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = now_epoch() - (unused_for_days as i64) * 24 * 60 * 60;
        let count = conn.execute(
            "DELETE FROM session_token WHERE coalesce(last_used, created) < ?1",
            params![cutoff],
        )?;
        Ok(count)
    }
}

impl ProviderTokenStore for SqliteStore {
    fn upsert_provider_tokens(&self, tokens: ProviderTokens) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO provider_token (user_id, access_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 access_token = ?2,
                 refresh_token = ?3,
                 expires_at = ?4,
                 updated = cast(strftime('%s','now') as int)",
            params![
                tokens.user_id,
                tokens.access_token,
                tokens.refresh_token,
                tokens.expires_at
            ],
        )?;
        Ok(())
    }

    fn get_provider_tokens(&self, user_id: usize) -> Result<Option<ProviderTokens>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, access_token, refresh_token, expires_at, updated
             FROM provider_token WHERE user_id = ?1",
        )?;
        let tokens = stmt
            .query_row(params![user_id], |row| {
                Ok(ProviderTokens {
                    user_id: row.get(0)?,
                    access_token: row.get(1)?,
                    refresh_token: row.get(2)?,
                    expires_at: row.get(3)?,
                    updated: system_time_from_epoch(row.get(4)?),
                })
            })
            .optional()?;
        Ok(tokens)
    }

    fn delete_provider_tokens(&self, user_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM provider_token WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }
}

impl PlaylistStore for SqliteStore {
    fn add_playlist(&self, playlist: StoredPlaylist) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let seeds = serde_json::to_string(&playlist.seeds)?;
        conn.execute(
            "INSERT INTO playlist (id, user_id, uri, name, kind, seeds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                playlist.id,
                playlist.user_id,
                playlist.uri,
                playlist.name,
                playlist.kind.map(|k| k.to_int()),
                seeds
            ],
        )?;
        Ok(())
    }

    fn get_user_playlists(&self, user_id: usize) -> Result<Vec<StoredPlaylist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, uri, name, kind, seeds, created
             FROM playlist WHERE user_id = ?1 ORDER BY created DESC, id",
        )?;
        let playlists = stmt
            .query_map(params![user_id], Self::row_to_playlist)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    fn get_playlist(&self, playlist_id: &str, user_id: usize) -> Result<Option<StoredPlaylist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, uri, name, kind, seeds, created
             FROM playlist WHERE id = ?1 AND user_id = ?2",
        )?;
        let playlist = stmt
            .query_row(params![playlist_id, user_id], Self::row_to_playlist)
            .optional()?;
        Ok(playlist)
    }

    fn delete_playlist(&self, playlist_id: &str, user_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM playlist WHERE id = ?1 AND user_id = ?2",
            params![playlist_id, user_id],
        )?;
        Ok(count > 0)
    }

    fn retain_playlists(&self, user_id: usize, present_ids: &[String]) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM playlist WHERE user_id = ?1")?;
        let stored_ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut delete_stmt =
            conn.prepare("DELETE FROM playlist WHERE user_id = ?1 AND id = ?2")?;
        let mut deleted = 0;
        for id in stored_ids.iter().filter(|id| !present_ids.contains(id)) {
            deleted += delete_stmt.execute(params![user_id, id])?;
        }
        Ok(deleted)
    }
}

impl SocialStore for SqliteStore {
    fn add_friendship(&self, user_id: usize, friend_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // Check both orderings under the same lock so concurrent requests
        // cannot store the pair twice.
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM friendship
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![user_id, friend_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO friendship (user_id, friend_id) VALUES (?1, ?2)",
            params![user_id, friend_id],
        )?;
        Ok(true)
    }

    fn are_friends(&self, user_id: usize, friend_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM friendship
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![user_id, friend_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn delete_friendship(&self, user_id: usize, friend_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM friendship
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![user_id, friend_id],
        )?;
        Ok(count > 0)
    }

    fn get_friends(&self, user_id: usize) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.spotify_id, u.display_name, u.bio, u.created
             FROM user u JOIN friendship f
                 ON (u.id = f.friend_id AND f.user_id = ?1)
                 OR (u.id = f.user_id AND f.friend_id = ?1)
             ORDER BY u.display_name",
        )?;
        let friends = stmt
            .query_map(params![user_id], Self::row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(friends)
    }

    fn add_comment(&self, author_id: usize, recipient_id: usize, text: &str) -> Result<Comment> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO comment (author_id, recipient_id, text) VALUES (?1, ?2, ?3)",
            params![author_id, recipient_id, text],
        )?;
        let comment_id = conn.last_insert_rowid();
        let comment = conn.query_row(
            "SELECT c.id, c.author_id, u.display_name, c.recipient_id, c.text, c.created
             FROM comment c JOIN user u ON u.id = c.author_id WHERE c.id = ?1",
            params![comment_id],
            Self::row_to_comment,
        )?;
        Ok(comment)
    }

    fn get_comments_for_user(&self, recipient_id: usize) -> Result<Vec<Comment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.author_id, u.display_name, c.recipient_id, c.text, c.created
             FROM comment c JOIN user u ON u.id = c.author_id
             WHERE c.recipient_id = ?1 ORDER BY c.created DESC, c.id DESC",
        )?;
        let comments = stmt
            .query_map(params![recipient_id], Self::row_to_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }
}
