//! Instance coordinator
//!
//! Resolves whether this process is the primary or a secondary, runs the
//! primary-side listener for forwarded file-open requests, and implements
//! the secondary-side send path.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::InstanceError;
use crate::protocol::{FileOpenRequest, InstanceRequest, InstanceResponse};
use crate::registration::{hello_handshake, Claim, Registration, SocketRegistration};
use crate::Result;

#[cfg(unix)]
type AsyncRegListener = tokio::net::UnixListener;
#[cfg(windows)]
type AsyncRegListener = tokio::net::TcpListener;

const CLAIM_ATTEMPTS: u32 = 5;
const CLAIM_BACKOFF: Duration = Duration::from_millis(50);
const SEND_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECTION_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Primary,
    Secondary { owner_pid: u32 },
}

pub struct InstanceCoordinator<R: Registration = SocketRegistration> {
    registration: R,
    state: InstanceState,
    listener_task: Option<tokio::task::JoinHandle<()>>,
}

impl<R: Registration> InstanceCoordinator<R> {
    /// Claim the registration or discover the live primary. Transient claim
    /// failures are retried with backoff before escalating to a fatal error.
    pub fn resolve(mut registration: R) -> Result<Self> {
        let mut backoff = CLAIM_BACKOFF;
        let mut last_error: Option<InstanceError> = None;

        for attempt in 1..=CLAIM_ATTEMPTS {
            match registration.try_claim() {
                Ok(Claim::Primary) => {
                    tracing::info!(pid = std::process::id(), "Resolved as primary instance");
                    return Ok(Self {
                        registration,
                        state: InstanceState::Primary,
                        listener_task: None,
                    });
                }
                Ok(Claim::Secondary { owner_pid }) => {
                    tracing::info!(primary_pid = owner_pid, "Resolved as secondary instance");
                    return Ok(Self {
                        registration,
                        state: InstanceState::Secondary { owner_pid },
                        listener_task: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Registration claim failed, retrying");
                    last_error = Some(err);
                    if attempt < CLAIM_ATTEMPTS {
                        std::thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
            }
        }

        Err(InstanceError::RegistrationUnavailable {
            attempts: CLAIM_ATTEMPTS,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self.state, InstanceState::Secondary { .. })
    }

    /// The discovered primary's process id; `None` unless secondary.
    pub fn primary_pid(&self) -> Option<u32> {
        match self.state {
            InstanceState::Secondary { owner_pid } => Some(owner_pid),
            InstanceState::Primary => None,
        }
    }

    /// Start the primary-side listener. Received file-open requests are
    /// marshaled onto the returned channel; the owning event loop drains it,
    /// so window/session state is only ever touched single-threaded.
    pub fn start_listener(&mut self) -> Result<mpsc::UnboundedReceiver<FileOpenRequest>> {
        let listener = self
            .registration
            .take_listener()
            .ok_or(InstanceError::NotPrimary)?;
        listener.set_nonblocking(true)?;
        let listener = AsyncRegListener::from_std(listener)?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.listener_task = Some(tokio::spawn(accept_loop(listener, tx)));

        Ok(rx)
    }

    /// Forward the filename list (and follow intent) to the primary.
    ///
    /// Waits only for the primary's liveness acknowledgment; the request
    /// itself is fire-and-forget and the caller exits without learning
    /// whether the files were processed. An unreachable primary is an error
    /// for the caller to surface, never grounds for self-promotion.
    pub fn send_files_to_primary(&self, filenames: &[String], follow: bool) -> Result<()> {
        if !self.is_secondary() {
            return Err(InstanceError::NotSecondary);
        }

        let mut stream = self
            .registration
            .connect_owner(SEND_TIMEOUT)
            .map_err(unreachable)?;

        hello_handshake(&mut stream).map_err(unreachable)?;

        let payload = serde_json::to_string(&InstanceRequest::OpenFiles {
            filenames: filenames.to_vec(),
            follow,
        })?;
        stream
            .write_all(payload.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .and_then(|_| stream.flush())
            .map_err(|e| InstanceError::PrimaryUnreachable(e.to_string()))?;

        tracing::info!(count = filenames.len(), follow, "Forwarded files to primary instance");

        Ok(())
    }

    /// Stop the listener and release the registration.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.listener_task.take() {
            task.abort();
        }
        self.registration.release();
    }
}

fn unreachable(err: InstanceError) -> InstanceError {
    match err {
        InstanceError::Io(e) => InstanceError::PrimaryUnreachable(e.to_string()),
        other => other,
    }
}

async fn accept_loop(
    listener: AsyncRegListener,
    tx: mpsc::UnboundedSender<FileOpenRequest>,
) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "Instance listener accept failed");
                continue;
            }
        };

        if let Err(err) = handle_connection(stream, &tx).await {
            tracing::warn!(error = %err, "Instance connection failed");
        }
    }
}

async fn handle_connection<S>(stream: S, tx: &mpsc::UnboundedSender<FileOpenRequest>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match tokio::time::timeout(CONNECTION_IDLE_TIMEOUT, lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            // Peer closed, or went idle without closing
            Ok(Ok(None)) | Err(_) => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
        };

        match serde_json::from_str::<InstanceRequest>(&line) {
            Ok(InstanceRequest::Hello) => {
                let ack = serde_json::to_string(&InstanceResponse::HelloAck {
                    pid: std::process::id(),
                })?;
                write_half.write_all(ack.as_bytes()).await?;
                write_half.write_all(b"\n").await?;
                write_half.flush().await?;
            }
            Ok(InstanceRequest::OpenFiles { filenames, follow }) => {
                tracing::info!(count = filenames.len(), follow, "Received forwarded file-open request");
                if tx.send(FileOpenRequest { filenames, follow }).is_err() {
                    // Event loop gone; we are shutting down
                    return Ok(());
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Malformed instance request");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registration::{RegListener, RegStream};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn socket_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("instance.sock")
    }

    /// Registration whose claim fails a set number of times before
    /// succeeding, standing in for a contended or flaky resource.
    struct FlakyRegistration {
        remaining_failures: u32,
        attempts: Arc<AtomicU32>,
    }

    impl Registration for FlakyRegistration {
        fn try_claim(&mut self) -> Result<Claim> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.remaining_failures > 0 {
                self.remaining_failures -= 1;
                return Err(InstanceError::Io(std::io::Error::new(
                    std::io::ErrorKind::WouldBlock,
                    "resource busy",
                )));
            }
            Ok(Claim::Primary)
        }

        fn release(&mut self) {}

        fn take_listener(&mut self) -> Option<RegListener> {
            None
        }

        fn connect_owner(&self, _timeout: Duration) -> Result<RegStream> {
            Err(InstanceError::PrimaryUnreachable("no live owner".to_string()))
        }
    }

    #[test]
    fn test_transient_claim_failures_are_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let registration = FlakyRegistration {
            remaining_failures: 2,
            attempts: attempts.clone(),
        };

        let coordinator = InstanceCoordinator::resolve(registration).unwrap();

        assert!(!coordinator.is_secondary());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_claim_exhaustion_is_fatal() {
        let attempts = Arc::new(AtomicU32::new(0));
        let registration = FlakyRegistration {
            remaining_failures: u32::MAX,
            attempts: attempts.clone(),
        };

        let result = InstanceCoordinator::resolve(registration);

        assert_eq!(attempts.load(Ordering::SeqCst), CLAIM_ATTEMPTS);
        assert!(matches!(
            result,
            Err(InstanceError::RegistrationUnavailable {
                attempts: CLAIM_ATTEMPTS,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_first_claimant_is_primary() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            InstanceCoordinator::resolve(SocketRegistration::new(socket_path(&dir))).unwrap();

        assert!(!coordinator.is_secondary());
        assert_eq!(coordinator.primary_pid(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_secondary_forwards_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let mut primary =
            InstanceCoordinator::resolve(SocketRegistration::new(path.clone())).unwrap();
        let mut requests = primary.start_listener().unwrap();

        // Secondary resolution and send are blocking; keep them off the
        // runtime threads so the listener can answer the handshake.
        let secondary = tokio::task::spawn_blocking(move || {
            let coordinator =
                InstanceCoordinator::resolve(SocketRegistration::new(path)).unwrap();
            assert!(coordinator.is_secondary());
            assert_eq!(coordinator.primary_pid(), Some(std::process::id()));

            coordinator
                .send_files_to_primary(&["a.log".to_string(), "b.log".to_string()], true)
                .unwrap();
        });

        let request = requests.recv().await.unwrap();
        assert_eq!(request.filenames, vec!["a.log", "b.log"]);
        assert!(request.follow);

        secondary.await.unwrap();
        primary.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_registration_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        // Simulate an abruptly killed primary: the socket file survives the
        // process but nothing is listening behind it.
        let dead = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(dead);
        assert!(path.exists());

        let coordinator =
            InstanceCoordinator::resolve(SocketRegistration::new(path)).unwrap();
        assert!(!coordinator.is_secondary());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_send_fails_when_primary_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let mut primary =
            InstanceCoordinator::resolve(SocketRegistration::new(path.clone())).unwrap();
        let _requests = primary.start_listener().unwrap();

        let secondary_path = path.clone();
        let secondary = tokio::task::spawn_blocking(move || {
            InstanceCoordinator::resolve(SocketRegistration::new(secondary_path)).unwrap()
        })
        .await
        .unwrap();
        assert!(secondary.is_secondary());

        // Primary exits between registration check and send
        primary.shutdown();

        let result = tokio::task::spawn_blocking(move || {
            secondary.send_files_to_primary(&["a.log".to_string()], false)
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(InstanceError::PrimaryUnreachable(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_primary_cannot_send_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            InstanceCoordinator::resolve(SocketRegistration::new(socket_path(&dir))).unwrap();

        let result = coordinator.send_files_to_primary(&["a.log".to_string()], false);
        assert!(matches!(result, Err(InstanceError::NotSecondary)));
    }
}
