//! SQLite schema for the relational backend
//!
//! The schema is a fixed, versioned descriptor applied at startup. Records
//! are kept as their encoded blobs keyed by `(kind, id)`, so every entity
//! kind shares one table and the column set never depends on the entity.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per record of any kind
        CREATE TABLE IF NOT EXISTS records (
            kind TEXT NOT NULL,
            id INTEGER NOT NULL,
            natural_key TEXT,
            body TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        );

        -- Next id per kind; never decreases, so ids are not reused after deletes
        CREATE TABLE IF NOT EXISTS id_watermarks (
            kind TEXT PRIMARY KEY,
            next_id INTEGER NOT NULL
        );

        -- Natural-key lookups for create-as-update
        CREATE INDEX IF NOT EXISTS idx_records_natural_key ON records(kind, natural_key);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
