use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// SQL fragment for columns defaulting to the current unix timestamp.
pub const EPOCH_NOW: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to the schema version before writing PRAGMA user_version.
/// A database whose user_version is below this was not created by us.
pub const SCHEMA_VERSION_BASE: i64 = 41000;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

#[allow(unused)]
#[derive(Debug, Clone, Copy)]
pub enum OnDelete {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl OnDelete {
    const fn sql_name(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::SetDefault => "SET DEFAULT",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub not_null: bool,
    pub default_sql: Option<&'static str>,
    pub references: Option<Reference>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            not_null: false,
            default_sql: None,
            references: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn default_sql(mut self, sql: &'static str) -> Self {
        self.default_sql = Some(sql);
        self
    }

    pub const fn references(
        mut self,
        table: &'static str,
        column: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        self.references = Some(Reference {
            table,
            column,
            on_delete,
        });
        self
    }
}

pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// (index name, indexed column) pairs created alongside the table.
    pub indices: &'static [(&'static str, &'static str)],
    /// Column sets carrying a table-level UNIQUE constraint.
    pub unique_sets: &'static [&'static [&'static str]],
}

impl TableDef {
    fn primary_key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name)
            .collect()
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        let pk_columns = self.primary_key_columns();
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name);
            sql.push(' ');
            sql.push_str(column.sql_type.sql_name());
            // A lone INTEGER PRIMARY KEY must stay inline so the column
            // aliases the rowid. Composite keys go in at table level below.
            if column.primary_key && pk_columns.len() == 1 {
                sql.push_str(" PRIMARY KEY");
            }
            if column.not_null {
                sql.push_str(" NOT NULL");
            }
            if let Some(default_sql) = column.default_sql {
                sql.push_str(&format!(" DEFAULT {}", default_sql));
            }
            if let Some(reference) = &column.references {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    reference.table,
                    reference.column,
                    reference.on_delete.sql_name()
                ));
            }
        }
        if pk_columns.len() > 1 {
            sql.push_str(&format!(", PRIMARY KEY ({})", pk_columns.join(", ")));
        }
        for unique_set in self.unique_sets {
            sql.push_str(&format!(", UNIQUE ({})", unique_set.join(", ")));
        }
        sql.push_str(");");
        conn.execute(&sql, params![])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }
}

pub struct SchemaVersion {
    pub version: usize,
    pub tables: &'static [TableDef],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

/// Column as reported by PRAGMA table_info.
struct LiveColumn {
    name: String,
    decl_type: String,
    not_null: bool,
    default_sql: Option<String>,
    pk_position: i64,
}

fn strip_outer_parens(s: &str) -> &str {
    if s.starts_with('(') && s.ends_with(')') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn live_columns(conn: &Connection, table_name: &str) -> Result<Vec<LiveColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table_name))?;
    let columns = stmt
        .query_map(params![], |row| {
            Ok(LiveColumn {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_sql: row.get(4)?,
                pk_position: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Column name sets of all unique indices on a table, including the
/// auto-indices SQLite creates for table-level UNIQUE constraints.
fn unique_column_sets(conn: &Connection, table_name: &str) -> Result<Vec<BTreeSet<String>>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({});", table_name))?;
    let unique_index_names = stmt
        .query_map(params![], |row| {
            let name: String = row.get(1)?;
            let is_unique: i64 = row.get(2)?;
            Ok((name, is_unique))
        })?
        .filter_map(|r| r.ok())
        .filter(|(_, is_unique)| *is_unique != 0)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

    let mut sets = Vec::new();
    for index_name in unique_index_names {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({});", index_name))?;
        let columns = stmt
            .query_map(params![], |row| row.get::<_, String>(2))?
            .filter_map(|r| r.ok())
            .collect::<BTreeSet<_>>();
        sets.push(columns);
    }
    Ok(sets)
}

struct LiveForeignKey {
    from_column: String,
    to_table: String,
    to_column: String,
    on_delete: String,
}

fn live_foreign_keys(conn: &Connection, table_name: &str) -> Result<Vec<LiveForeignKey>> {
    // PRAGMA foreign_key_list columns: id, seq, table, from, to, on_update, on_delete, match
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({});", table_name))?;
    let fks = stmt
        .query_map(params![], |row| {
            Ok(LiveForeignKey {
                from_column: row.get(3)?,
                to_table: row.get(2)?,
                to_column: row.get(4)?,
                on_delete: row.get(6)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(fks)
}

impl SchemaVersion {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!(
                "PRAGMA user_version = {}",
                SCHEMA_VERSION_BASE + self.version as i64
            ),
            params![],
        )?;
        Ok(())
    }

    /// Check that the live database matches this schema version: per-table
    /// column names, types, nullability, defaults and primary keys, plus
    /// indices, unique constraints and foreign keys.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            self.validate_columns(conn, table)?;
            self.validate_indices(conn, table)?;
            self.validate_unique_sets(conn, table)?;
            self.validate_foreign_keys(conn, table)?;
        }
        Ok(())
    }

    fn validate_columns(&self, conn: &Connection, table: &TableDef) -> Result<()> {
        let actual = live_columns(conn, table.name)?;
        if actual.len() != table.columns.len() {
            bail!(
                "table {} has {} columns ({}), expected {} ({})",
                table.name,
                actual.len(),
                actual
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                table.columns.len(),
                table
                    .columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        for (actual, expected) in actual.iter().zip(table.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "table {} column name mismatch: expected {}, found {}",
                    table.name,
                    expected.name,
                    actual.name
                );
            }
            if actual.decl_type != expected.sql_type.sql_name() {
                bail!(
                    "table {} column {} type mismatch: expected {}, found {}",
                    table.name,
                    expected.name,
                    expected.sql_type.sql_name(),
                    actual.decl_type
                );
            }
            if actual.not_null != expected.not_null {
                bail!(
                    "table {} column {} not-null mismatch: expected {}, found {}",
                    table.name,
                    expected.name,
                    expected.not_null,
                    actual.not_null
                );
            }
            // SQLite may report stored defaults wrapped in parentheses.
            if actual.default_sql.as_deref().map(strip_outer_parens)
                != expected.default_sql.map(strip_outer_parens)
            {
                bail!(
                    "table {} column {} default mismatch: expected {:?}, found {:?}",
                    table.name,
                    expected.name,
                    expected.default_sql,
                    actual.default_sql
                );
            }
            // pk_position counts from 1 within the primary key, 0 otherwise.
            if (actual.pk_position > 0) != expected.primary_key {
                bail!(
                    "table {} column {} primary key mismatch: expected {}, found {}",
                    table.name,
                    expected.name,
                    expected.primary_key,
                    actual.pk_position > 0
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection, table: &TableDef) -> Result<()> {
        for (index_name, _) in table.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, table.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("table {} is missing index {}", table.name, index_name);
            }
        }
        Ok(())
    }

    fn validate_unique_sets(&self, conn: &Connection, table: &TableDef) -> Result<()> {
        if table.unique_sets.is_empty() {
            return Ok(());
        }
        let actual_sets = unique_column_sets(conn, table.name)?;
        for expected_set in table.unique_sets {
            let expected = expected_set
                .iter()
                .map(|c| c.to_string())
                .collect::<BTreeSet<_>>();
            if !actual_sets.contains(&expected) {
                bail!(
                    "table {} is missing a unique constraint on ({})",
                    table.name,
                    expected_set.join(", ")
                );
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection, table: &TableDef) -> Result<()> {
        let actual_fks = live_foreign_keys(conn, table.name)?;
        for column in table.columns {
            let Some(expected) = &column.references else {
                continue;
            };
            let matched = actual_fks.iter().any(|actual| {
                actual.from_column == column.name
                    && actual.to_table == expected.table
                    && actual.to_column == expected.column
                    && actual.on_delete == expected.on_delete.sql_name()
            });
            if matched {
                continue;
            }
            if let Some(actual) = actual_fks.iter().find(|fk| fk.from_column == column.name) {
                bail!(
                    "table {} column {} foreign key mismatch: expected REFERENCES {}({}) ON DELETE {}, found REFERENCES {}({}) ON DELETE {}",
                    table.name,
                    column.name,
                    expected.table,
                    expected.column,
                    expected.on_delete.sql_name(),
                    actual.to_table,
                    actual.to_column,
                    actual.on_delete
                );
            }
            bail!(
                "table {} column {} is missing a foreign key: expected REFERENCES {}({}) ON DELETE {}",
                table.name,
                column.name,
                expected.table,
                expected.column,
                expected.on_delete.sql_name()
            );
        }
        Ok(())
    }
}
