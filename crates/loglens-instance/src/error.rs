//! Instance coordination error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Primary instance unreachable: {0}")]
    PrimaryUnreachable(String),

    #[error("Registration resource unavailable after {attempts} attempts: {reason}")]
    RegistrationUnavailable { attempts: u32, reason: String },

    #[error("Not a secondary instance")]
    NotSecondary,

    #[error("Not the primary instance")]
    NotPrimary,
}
