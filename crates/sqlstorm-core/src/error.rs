//! Core error types.

/// Errors that can occur in the schema model and checkpoint layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A checkpoint file could not be read or written.
    #[error("checkpoint i/o error for {path}: {source}")]
    CheckpointIo {
        /// Path of the checkpoint file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint file contained invalid JSON.
    #[error("checkpoint parse error: {0}")]
    CheckpointParse(#[from] serde_json::Error),

    /// The checkpoint was written by an incompatible version of the tool.
    #[error("checkpoint version mismatch: file has {found}, code expects {expected}")]
    VersionMismatch {
        /// Version found in the file.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// A table referenced by name does not exist in the catalog.
    #[error("table not found in catalog: {0}")]
    MissingTable(String),

    /// An option name did not resolve to a registered option.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// An option was given a value outside its accepted range.
    #[error("invalid value for option '{option}': {reason}")]
    InvalidOption {
        /// The option's long name.
        option: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Two options were combined in an unsupported way.
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// The workload probability table summed to zero.
    #[error("no SQL-producing option is enabled")]
    NothingToDo,
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
