//! Database connection and operations

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

/// Handle to the profile's session database. Cheap to clone; all clones
/// serialize on the one underlying connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        // WAL so the autosave timer never stalls a concurrent reader
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a query against the connection.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a mutation inside a transaction; rolled back on error.
    pub fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.read(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    /// Boolean settings are stored as "true"/"false"; "1" is accepted for
    /// hand-edited stores.
    pub fn get_bool_setting(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .get_setting(key)?
            .map(|value| matches!(value.as_str(), "true" | "1")))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.write(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.read(|conn| {
            let count: i32 = conn.query_row("SELECT COUNT(*) FROM windows", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_settings_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_setting("load_last_session").unwrap().is_none());

        db.set_setting("load_last_session", "true").unwrap();
        assert_eq!(
            db.get_setting("load_last_session").unwrap().as_deref(),
            Some("true")
        );

        db.set_setting("load_last_session", "false").unwrap();
        assert_eq!(
            db.get_setting("load_last_session").unwrap().as_deref(),
            Some("false")
        );
    }

    #[test]
    fn test_bool_setting() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_bool_setting("load_last_session").unwrap(), None);

        db.set_setting("load_last_session", "true").unwrap();
        assert_eq!(
            db.get_bool_setting("load_last_session").unwrap(),
            Some(true)
        );

        db.set_setting("load_last_session", "false").unwrap();
        assert_eq!(
            db.get_bool_setting("load_last_session").unwrap(),
            Some(false)
        );

        db.set_setting("load_last_session", "1").unwrap();
        assert_eq!(
            db.get_bool_setting("load_last_session").unwrap(),
            Some(true)
        );
    }
}
