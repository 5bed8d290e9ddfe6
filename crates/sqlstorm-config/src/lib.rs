//! Configuration for sqlstorm: per-endpoint INI sections, the
//! option-probability file, and the server-variable specs backing the
//! `set-global-variable` operation.

mod endpoints;
mod error;
mod prob_file;
mod server_options;

pub use endpoints::{load_endpoints, EndpointParams};
pub use error::{ConfigError, Result};
pub use prob_file::apply_prob_file;
pub use server_options::{load_server_options, parse_server_option, ServerVariable};
