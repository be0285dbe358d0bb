//! Error types for csidx

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Error, Debug)]
pub enum Error {
    /// The file is not a well-formed trigram index
    #[error("invalid index file: {0}")]
    InvalidIndex(&'static str),

    /// Underlying file or pipe error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external tool could not be launched
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to launch
        program: String,
        /// Launch error from the OS
        source: std::io::Error,
    },

    /// The external tool ran but reported failure
    #[error("`{program}` failed: {detail}")]
    Tool {
        /// Program that failed
        program: String,
        /// Captured diagnostic output
        detail: String,
    },
}
