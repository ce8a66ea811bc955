//! Primary-election registration resource
//!
//! The shipped implementation claims a local socket: binding it is the
//! atomic check-and-set that elects exactly one primary per user profile.
//! A socket file left behind by an abnormally terminated primary is detected
//! by a refused or timed-out liveness handshake and reclaimed, so a crash
//! never leaks a registration that blocks future primaries.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::InstanceError;
use crate::protocol::{InstanceRequest, InstanceResponse};
use crate::Result;

#[cfg(unix)]
pub type RegListener = std::os::unix::net::UnixListener;
#[cfg(unix)]
pub type RegStream = std::os::unix::net::UnixStream;

#[cfg(windows)]
pub type RegListener = std::net::TcpListener;
#[cfg(windows)]
pub type RegStream = std::net::TcpStream;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a registration claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Primary,
    Secondary { owner_pid: u32 },
}

/// Cross-process arbitration primitive electing exactly one primary.
///
/// Implemented per platform (socket bind here; a file lock or named mutex
/// would slot in behind the same interface, pairing its claim with its own
/// forwarding channel).
pub trait Registration: Send {
    /// Atomically claim the resource, or discover the live owner.
    fn try_claim(&mut self) -> Result<Claim>;

    /// Release the claim. Also released implicitly on drop.
    fn release(&mut self);

    /// Hand over the forwarding channel's listener. `None` unless this
    /// registration holds the primary claim.
    fn take_listener(&mut self) -> Option<RegListener>;

    /// Open a stream to the live owner's forwarding channel, with both
    /// directions bounded by `timeout`.
    fn connect_owner(&self, timeout: Duration) -> Result<RegStream>;
}

pub struct SocketRegistration {
    path: PathBuf,
    listener: Option<RegListener>,
    // Stays true after the coordinator takes the listener
    claimed: bool,
}

impl SocketRegistration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            listener: None,
            claimed: false,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn bind(&self) -> std::io::Result<RegListener> {
        #[cfg(unix)]
        {
            RegListener::bind(&self.path)
        }
        #[cfg(windows)]
        {
            RegListener::bind(("127.0.0.1", instance_port(&self.path)))
        }
    }

    fn probe_owner(&self) -> Result<u32> {
        let mut stream = self.connect_owner(HANDSHAKE_TIMEOUT)?;
        hello_handshake(&mut stream)
    }
}

impl Registration for SocketRegistration {
    fn try_claim(&mut self) -> Result<Claim> {
        match self.bind() {
            Ok(listener) => {
                self.listener = Some(listener);
                self.claimed = true;
                Ok(Claim::Primary)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                match self.probe_owner() {
                    Ok(owner_pid) => Ok(Claim::Secondary { owner_pid }),
                    Err(err) => {
                        // Stale registration from an abnormal exit: reclaim it
                        tracing::warn!(
                            path = %self.path.display(),
                            error = %err,
                            "Registration holder not responding, reclaiming"
                        );
                        #[cfg(unix)]
                        std::fs::remove_file(&self.path)?;
                        let listener = self.bind()?;
                        self.listener = Some(listener);
                        self.claimed = true;
                        Ok(Claim::Primary)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn release(&mut self) {
        if self.claimed {
            self.listener = None;
            self.claimed = false;
            #[cfg(unix)]
            let _ = std::fs::remove_file(&self.path);
            tracing::debug!(path = %self.path.display(), "Released instance registration");
        }
    }

    fn take_listener(&mut self) -> Option<RegListener> {
        self.listener.take()
    }

    fn connect_owner(&self, timeout: Duration) -> Result<RegStream> {
        let stream = connect(&self.path, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(stream)
    }
}

impl Drop for SocketRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

/// Loopback port standing in for the socket path on Windows, derived from
/// the registration path so each profile gets its own registration.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn instance_port(path: &std::path::Path) -> u16 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    // Stay inside the dynamic/private port range
    49152 + (hasher.finish() % 16384) as u16
}

#[cfg(unix)]
fn connect(path: &std::path::Path, _timeout: Duration) -> std::io::Result<RegStream> {
    // Unix socket connects fail fast with ECONNREFUSED when stale
    RegStream::connect(path)
}

#[cfg(windows)]
fn connect(path: &std::path::Path, timeout: Duration) -> std::io::Result<RegStream> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], instance_port(path)));
    RegStream::connect_timeout(&addr, timeout)
}

/// Send `Hello` and wait (bounded by the stream's timeouts) for the owner's
/// liveness acknowledgment carrying its pid.
pub(crate) fn hello_handshake<S: Read + Write>(stream: &mut S) -> Result<u32> {
    let payload = serde_json::to_string(&InstanceRequest::Hello)?;
    stream.write_all(payload.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(InstanceError::PrimaryUnreachable(
            "connection closed during handshake".to_string(),
        ));
    }

    match serde_json::from_str(&line)? {
        InstanceResponse::HelloAck { pid } => Ok(pid),
        InstanceResponse::Error { message } => Err(InstanceError::PrimaryUnreachable(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_instance_port_is_stable_per_profile() {
        let alice = Path::new("/data/profiles/alice/loglens.sock");
        let bob = Path::new("/data/profiles/bob/loglens.sock");

        assert_eq!(instance_port(alice), instance_port(alice));
        assert_ne!(instance_port(alice), instance_port(bob));
        assert!(instance_port(alice) >= 49152);
    }
}
