//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] loglens_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] loglens_session::SessionError),

    #[error("Instance error: {0}")]
    Instance(#[from] loglens_instance::InstanceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
