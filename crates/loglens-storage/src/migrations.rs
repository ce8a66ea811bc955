//! Database migrations
//!
//! Schema: windows, open_files, settings

use crate::Result;
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<i32, _> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        });

    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(rusqlite::Error::SqliteFailure(_, _)) => {
            // Table doesn't exist yet
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
                [],
            )?;
            conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1: Initial schema");

    // Windows table - position keeps creation order across a reload
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS windows (
            id TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            geometry BLOB NOT NULL DEFAULT x''
        );

        CREATE INDEX IF NOT EXISTS idx_windows_position ON windows(position);
    "#,
    )?;

    // Open files table - position is the display/tab order within a window
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS open_files (
            window_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            top_line INTEGER NOT NULL DEFAULT 0,
            view_context TEXT NOT NULL DEFAULT '',
            timeline_nodes TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (window_id, position),
            FOREIGN KEY (window_id) REFERENCES windows(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_open_files_window ON open_files(window_id);
    "#,
    )?;

    // Settings table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
    )?;

    Ok(())
}
