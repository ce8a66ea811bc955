//! Wire protocol between secondary and primary instances
//!
//! Line-delimited JSON over the registration socket. The only reply in the
//! protocol is the `Hello` liveness acknowledgment; `OpenFiles` is
//! fire-and-forget and carries no processing confirmation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceRequest {
    Hello,
    OpenFiles { filenames: Vec<String>, follow: bool },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceResponse {
    HelloAck { pid: u32 },
    Error { message: String },
}

/// A forwarded file-open command, handed to the primary's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOpenRequest {
    /// Filenames in the order the secondary was asked to open them
    pub filenames: Vec<String>,
    pub follow: bool,
}
