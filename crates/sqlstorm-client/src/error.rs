//! Client error classification.

/// Connection to the server was lost mid-statement.
pub const ERR_SERVER_GONE: u16 = 2006;
/// Connection to the server died.
pub const ERR_SERVER_LOST: u16 = 2013;
/// The cluster node is not prepared for queries.
pub const ERR_WSREP_NOT_PREPARED: u16 = 1047;
/// The secondary engine is not ready.
pub const ERR_SECONDARY_NOT_READY: u16 = 6000;

/// Errors surfaced by the client wrapper.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected a statement.
    #[error("server error {code}: {message}")]
    Server {
        /// Server error number.
        code: u16,
        /// Server error text.
        message: String,
    },

    /// The connection broke or could not be established.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint parameters could not be turned into connection options.
    #[error("connection setup error: {0}")]
    Setup(String),

    /// A value could not be decoded from a result row.
    #[error("result decode error: {0}")]
    Decode(String),
}

/// Convenience alias used throughout the client crate.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// The server error number, if the server produced one.
    pub fn code(&self) -> Option<u16> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when a sleep-and-reconnect is the right response.
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Server { code, .. } => {
                matches!(*code, ERR_SERVER_GONE | ERR_SERVER_LOST | ERR_WSREP_NOT_PREPARED)
            }
            _ => false,
        }
    }

    /// Returns `true` for errors that must stop the whole run when they are
    /// not explicitly ignored.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Server { code, .. } => matches!(
                *code,
                ERR_SERVER_GONE | ERR_SERVER_LOST | ERR_WSREP_NOT_PREPARED | ERR_SECONDARY_NOT_READY
            ),
            _ => false,
        }
    }
}

impl From<mysql::Error> for ClientError {
    fn from(err: mysql::Error) -> Self {
        match err {
            mysql::Error::MySqlError(server) => ClientError::Server {
                code: server.code,
                message: server.message,
            },
            mysql::Error::IoError(io) => ClientError::Transport(io.to_string()),
            mysql::Error::UrlError(url) => ClientError::Setup(url.to_string()),
            other => ClientError::Transport(other.to_string()),
        }
    }
}
