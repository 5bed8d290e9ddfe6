//! Configuration error types.

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The INI file did not parse.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// Path of the file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A key carried a value of the wrong shape.
    #[error("invalid value for '{key}' in section [{section}]: {reason}")]
    InvalidValue {
        /// The section the key lives in.
        section: String,
        /// The key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A line in an option file did not resolve to a registered option.
    #[error(transparent)]
    Option(#[from] sqlstorm_core::CoreError),

    /// A line could not be split into `name=value`.
    #[error("malformed line in {path}: '{line}'")]
    MalformedLine {
        /// Path of the file.
        path: String,
        /// The offending line.
        line: String,
    },
}

/// Convenience alias used throughout the config crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
