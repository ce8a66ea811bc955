//! Session persistence
//!
//! Load/save of the full session shape against the durable store handle
//! supplied by the caller. Saves replace the stored shape wholesale in one
//! transaction; loads tolerate an absent or partially malformed store and
//! yield an empty session instead of failing.

use loglens_storage::Database;

use crate::session::{OpenFile, Session, TimelineNode, Window};
use crate::Result;

impl Session {
    /// Persist the full session shape, replacing whatever was stored.
    pub fn save_to_storage(&self, db: &Database) -> Result<()> {
        db.write(|conn| {
            conn.execute("DELETE FROM open_files", [])?;
            conn.execute("DELETE FROM windows", [])?;

            for (position, window) in self.window_entries().iter().enumerate() {
                conn.execute(
                    "INSERT INTO windows (id, position, geometry) VALUES (?1, ?2, ?3)",
                    rusqlite::params![window.id, position as i64, window.geometry],
                )?;

                for (file_position, file) in window.open_files.iter().enumerate() {
                    let timeline_json = serde_json::to_string(&file.timeline_nodes)?;
                    conn.execute(
                        "INSERT INTO open_files
                         (window_id, position, file_name, top_line, view_context, timeline_nodes)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        rusqlite::params![
                            window.id,
                            file_position as i64,
                            file.file_name,
                            file.top_line as i64,
                            file.view_context,
                            timeline_json,
                        ],
                    )?;
                }
            }

            Ok(())
        })?;

        tracing::debug!(windows = self.window_count(), "Saved session to storage");

        Ok(())
    }

    /// Load the stored session shape. A store with no prior session yields
    /// an empty session; the caller then adds a first window.
    pub fn retrieve_from_storage(db: &Database) -> Result<Session> {
        let mut session = Session::new();

        let windows: Vec<(String, Vec<u8>)> = db.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, geometry FROM windows ORDER BY position")?;
            let windows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(windows)
        })?;

        for (id, geometry) in windows {
            let open_files = load_open_files(db, &id)?;
            session.push_window(Window {
                id,
                geometry,
                open_files,
            });
        }

        tracing::info!(
            windows = session.window_count(),
            "Retrieved session from storage"
        );

        Ok(session)
    }

    /// Drop stored windows that are no longer part of the live session.
    ///
    /// Run only when a brand-new session was started, so an in-progress
    /// multi-window restore is never pruned out from under itself.
    pub fn prune_inactive(&self, db: &Database) -> Result<()> {
        let live = self.windows();

        let pruned = db.write(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM windows")?;
            let stored: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();

            let mut pruned = 0usize;
            for id in stored {
                if !live.contains(&id) {
                    conn.execute("DELETE FROM windows WHERE id = ?1", [&id])?;
                    pruned += 1;
                }
            }
            Ok(pruned)
        })?;

        if pruned > 0 {
            tracing::info!(pruned, "Cleared inactive window sessions");
        }

        Ok(())
    }
}

fn load_open_files(db: &Database, window_id: &str) -> Result<Vec<OpenFile>> {
    let files = db.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT file_name, top_line, view_context, timeline_nodes
             FROM open_files WHERE window_id = ?1 ORDER BY position",
        )?;

        let files = stmt
            .query_map([window_id], |row| {
                let timeline_json: String = row.get(3)?;
                let timeline_nodes: Vec<TimelineNode> =
                    serde_json::from_str(&timeline_json).unwrap_or_default();

                Ok(OpenFile {
                    file_name: row.get(0)?,
                    top_line: row.get::<_, i64>(1)?.max(0) as u64,
                    view_context: row.get(2)?,
                    timeline_nodes,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(files)
    })?;

    Ok(files)
}
