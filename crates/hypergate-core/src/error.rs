//! Error types for the hypergate core library.

use thiserror::Error;

/// Result type alias using the hypergate core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for configuration and endpoint resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host identifier that cannot be dialed on this platform
    #[error("Unsupported RPC host {host:?}: {reason}")]
    UnsupportedHost {
        /// The offending host identifier.
        host: String,
        /// Why it cannot be resolved.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
