//! Bootstrap orchestrator
//!
//! Sequences instance coordination, session restore-or-create, CLI
//! overrides, and background maintenance. Pure composition: all state
//! lives in the session, the coordinator, and the storage handle.

use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use loglens_instance::{FileOpenRequest, InstanceCoordinator, SocketRegistration};
use loglens_session::{OpenFile, Session};
use loglens_storage::Database;

use crate::config::Config;
use crate::Result;

const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Structured parameter set produced by the CLI layer, consumed once at
/// startup.
#[derive(Debug, Clone, Default)]
pub struct LaunchParameters {
    /// Log files to open, in order
    pub filenames: Vec<String>,
    /// Open files in follow (tail) mode
    pub follow: bool,
    /// Force a fresh session even if auto-restore is enabled
    pub new_session: bool,
    /// Force restoring the previous session
    pub load_session: bool,
    /// Skip instance coordination and always run standalone
    pub multi_instance: bool,
    /// Window size override; applied only when both are positive
    pub window_width: u32,
    pub window_height: u32,
}

/// Seam to the windowing toolkit. The orchestrator drives it; it never
/// reaches back into the session.
pub trait WindowHost {
    /// Create and show a top-level window for the given id.
    fn create_window(&mut self, window_id: &str);
    /// Hand the stored geometry blob back to the toolkit, verbatim.
    fn restore_geometry(&mut self, window_id: &str, geometry: &[u8]);
    fn resize(&mut self, window_id: &str, width: u32, height: u32);
    /// Open a log source in the window, optionally in follow mode.
    fn load_file(&mut self, window_id: &str, file_name: &str, follow: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Secondary instance: arguments were forwarded, the process should exit
    Forwarded,
    Primary {
        restored: bool,
        active_window: String,
    },
}

pub struct Launcher {
    config: Config,
    db: Database,
    session: Session,
    coordinator: Option<InstanceCoordinator>,
    requests: Option<mpsc::UnboundedReceiver<FileOpenRequest>>,
}

impl Launcher {
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(mut config: Config, db: Database) -> Self {
        if let Ok(Some(value)) = db.get_bool_setting("load_last_session") {
            config.load_last_session = value;
        }

        Self {
            config,
            db,
            session: Session::new(),
            coordinator: None,
            requests: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the bootstrap sequence: coordinator check, secondary
    /// short-circuit, session restore-or-create, CLI overrides, and
    /// conditional maintenance.
    pub fn launch(
        &mut self,
        params: &LaunchParameters,
        host: &mut dyn WindowHost,
    ) -> Result<LaunchOutcome> {
        if !params.multi_instance {
            let mut coordinator = InstanceCoordinator::resolve(SocketRegistration::new(
                &self.config.socket_path,
            ))?;

            if coordinator.is_secondary() {
                tracing::info!(
                    primary_pid = ?coordinator.primary_pid(),
                    "Found another loglens, forwarding arguments"
                );
                coordinator.send_files_to_primary(&params.filenames, params.follow)?;
                return Ok(LaunchOutcome::Forwarded);
            }

            // The listener must be up before any later launch probes the
            // registration, or a racing secondary would mistake us for a
            // stale holder.
            self.requests = Some(coordinator.start_listener()?);
            self.coordinator = Some(coordinator);
        }

        let restore = params.load_session
            || (params.filenames.is_empty()
                && !params.new_session
                && self.config.load_last_session);

        let active_window = if restore {
            self.session = Session::retrieve_from_storage(&self.db)?;
            match self.session.windows().last().cloned() {
                Some(last) => {
                    for window_id in self.session.windows() {
                        host.create_window(&window_id);
                        host.restore_geometry(&window_id, &self.session.geometry(&window_id));
                        for file in self.session.open_files(&window_id) {
                            host.load_file(&window_id, &file.file_name, false);
                        }
                    }
                    last
                }
                // Nothing stored yet; first run still gets a window
                None => self.create_fresh_window(host),
            }
        } else {
            self.create_fresh_window(host)
        };

        if params.window_width > 0 && params.window_height > 0 {
            host.resize(&active_window, params.window_width, params.window_height);
        }

        for filename in &params.filenames {
            self.load_initial_file(&active_window, filename, params.follow, host);
        }

        if !restore {
            self.session.prune_inactive(&self.db)?;
        }

        Ok(LaunchOutcome::Primary {
            restored: restore,
            active_window,
        })
    }

    /// Drive background maintenance: drain forwarded file-open requests onto
    /// this (single-threaded) loop and autosave the session periodically.
    pub async fn run(&mut self, host: &mut dyn WindowHost) -> Result<()> {
        let mut requests = self.requests.take();
        let mut autosave = tokio::time::interval(AUTOSAVE_INTERVAL);
        autosave.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it
        autosave.tick().await;

        loop {
            match requests.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        request = rx.recv() => match request {
                            Some(request) => self.apply_forwarded(request, host),
                            None => break,
                        },
                        _ = autosave.tick() => self.autosave(),
                    }
                }
                None => {
                    autosave.tick().await;
                    self.autosave();
                }
            }
        }

        Ok(())
    }

    /// Apply a file-open request forwarded by a secondary instance, as if
    /// each file had been passed to a fresh launch.
    pub fn apply_forwarded(&mut self, request: FileOpenRequest, host: &mut dyn WindowHost) {
        let Some(active_window) = self.session.windows().last().cloned() else {
            tracing::warn!("Dropping forwarded files: no window in session");
            return;
        };

        tracing::info!(
            count = request.filenames.len(),
            follow = request.follow,
            "Opening forwarded files"
        );

        for filename in &request.filenames {
            self.load_initial_file(&active_window, filename, request.follow, host);
        }
    }

    /// Persist the session and release the instance registration.
    pub fn shutdown(&mut self) -> Result<()> {
        self.session.save_to_storage(&self.db)?;
        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.shutdown();
        }
        Ok(())
    }

    fn create_fresh_window(&mut self, host: &mut dyn WindowHost) -> String {
        let window_id = Uuid::new_v4().to_string();
        self.session.add(&window_id);
        host.create_window(&window_id);
        host.restore_geometry(&window_id, &self.session.geometry(&window_id));
        window_id
    }

    fn load_initial_file(
        &mut self,
        window_id: &str,
        filename: &str,
        follow: bool,
        host: &mut dyn WindowHost,
    ) {
        host.load_file(window_id, filename, follow);

        let mut files = self.session.open_files(window_id);
        files.push(OpenFile::new(filename));
        self.session.set_open_files(window_id, files);
    }

    fn autosave(&self) {
        if let Err(err) = self.session.save_to_storage(&self.db) {
            // Losing one autosave is tolerable; the next tick retries
            tracing::warn!(error = %err, "Session autosave failed");
        }
    }

    #[cfg(test)]
    fn requests_mut(&mut self) -> Option<&mut mpsc::UnboundedReceiver<FileOpenRequest>> {
        self.requests.as_mut()
    }
}
