//! LogLens Instance Coordination
//!
//! Arbitrates single-instance semantics across OS processes sharing a user
//! profile. The first process to claim the registration resource becomes the
//! primary for its lifetime; later launches resolve as secondaries, forward
//! their file arguments to the primary over a local socket, and exit.
//!
//! The registration resource is the socket itself: binding it is the atomic
//! check-and-set claim, and the same socket carries forwarded file-open
//! requests, which the primary marshals onto its main event loop.

mod coordinator;
mod error;
mod protocol;
mod registration;

pub use coordinator::InstanceCoordinator;
pub use error::InstanceError;
pub use protocol::{FileOpenRequest, InstanceRequest, InstanceResponse};
pub use registration::{Claim, RegListener, RegStream, Registration, SocketRegistration};

pub type Result<T> = std::result::Result<T, InstanceError>;
