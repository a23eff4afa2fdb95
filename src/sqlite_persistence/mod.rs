pub mod versioned_schema;

pub use versioned_schema::{
    ColumnDef, OnDelete, SchemaVersion, SqlType, TableDef, EPOCH_NOW, SCHEMA_VERSION_BASE,
};

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::info;

/// Open a database file, creating it with the latest schema when absent.
///
/// Existing files are checked against the schema version recorded in
/// PRAGMA user_version, validated against the matching [SchemaVersion]
/// and migrated forward to the latest version.
pub fn open_or_create<P: AsRef<Path>>(db_path: P, schemas: &[SchemaVersion]) -> Result<Connection> {
    let conn = if db_path.as_ref().exists() {
        Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        let conn = Connection::open(db_path)?;
        let latest = schemas.last().context("No schema versions defined")?;
        latest.create(&conn)?;
        conn
    };

    // Foreign key enforcement is off by default and per connection.
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let raw_version: i64 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .context("Failed to read database version")?;
    let version = raw_version - SCHEMA_VERSION_BASE;
    if version < 0 {
        bail!(
            "Database user_version {} is below the version base, not one of our files",
            raw_version
        );
    }
    let version = version as usize;
    if version >= schemas.len() {
        bail!(
            "Database schema version {} is newer than this binary supports",
            version
        );
    }
    schemas[version].validate(&conn)?;

    migrate(&conn, schemas, version)?;
    Ok(conn)
}

fn migrate(conn: &Connection, schemas: &[SchemaVersion], from_version: usize) -> Result<()> {
    let mut reached = from_version;
    for schema in schemas.iter().skip(from_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating database from version {} to {}",
                reached, schema.version
            );
            migration_fn(conn)?;
            reached = schema.version;
        }
    }
    conn.execute(
        &format!(
            "PRAGMA user_version = {}",
            SCHEMA_VERSION_BASE + reached as i64
        ),
        [],
    )?;
    Ok(())
}
