//! LogLens Storage Layer
//!
//! SQLite-based persistence for the session shape and user settings.
//! All multi-row writes are transactional.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
