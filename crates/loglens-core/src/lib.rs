//! LogLens Core
//!
//! Bootstrap layer of the log viewer: decides whether this process is the
//! sole primary instance or a secondary that hands its file arguments to the
//! running primary, and restores/persists the shape of the user's working
//! session across restarts.

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{LaunchOutcome, LaunchParameters, Launcher, WindowHost};
pub use config::Config;
pub use error::CoreError;

// Re-export core components
pub use loglens_instance::{FileOpenRequest, InstanceCoordinator, InstanceError};
pub use loglens_session::{OpenFile, RemoveOutcome, Session, SessionError, TimelineNode, Window};
pub use loglens_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(true).init();
}
