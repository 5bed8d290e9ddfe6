//! Workload error types.

/// Errors that can occur while setting up or running the workload.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// A schema or checkpoint problem.
    #[error(transparent)]
    Core(#[from] sqlstorm_core::CoreError),

    /// A client/transport problem outside the tolerated classes.
    #[error(transparent)]
    Client(#[from] sqlstorm_client::ClientError),

    /// A configuration problem.
    #[error(transparent)]
    Config(#[from] sqlstorm_config::ConfigError),

    /// A log file could not be created or written.
    #[error("log i/o error for {path}: {source}")]
    LogIo {
        /// Path of the log file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A setup statement that must succeed did not.
    #[error("setup statement failed: {sql}: {reason}")]
    Setup {
        /// The statement.
        sql: String,
        /// The server's complaint.
        reason: String,
    },

    /// The run was stopped by the shared failure flag.
    #[error("run aborted: a worker hit a fatal error")]
    Aborted,
}

/// Convenience alias used throughout the workload crate.
pub type Result<T> = std::result::Result<T, WorkloadError>;
