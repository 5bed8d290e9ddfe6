//! MySQL client wrapper for sqlstorm.
//!
//! The rest of the system never touches the driver directly: it executes
//! statements through [`Session`] and classifies failures through
//! [`ClientError`].

mod error;
mod session;

pub use error::{ClientError, Result, ERR_SECONDARY_NOT_READY, ERR_SERVER_GONE, ERR_SERVER_LOST, ERR_WSREP_NOT_PREPARED};
pub use session::{Outcome, ResultGrid, Session};
