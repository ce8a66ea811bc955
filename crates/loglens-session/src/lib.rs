//! LogLens Session Management
//!
//! The session records which windows were open, which log files were loaded
//! in each, the scroll position of every file, and the window geometry, so
//! the working set can be restored exactly across restarts.
//!
//! The session is owned by the bootstrap layer and threaded through by
//! reference; it is not internally synchronized and assumes access is
//! confined to the owning event loop.

mod error;
mod session;
mod store;

pub use error::SessionError;
pub use session::{OpenFile, RemoveOutcome, Session, TimelineNode, Window};

pub type Result<T> = std::result::Result<T, SessionError>;
