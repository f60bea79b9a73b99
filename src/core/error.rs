//! Error types for the application

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The snapshot source could not be read this cycle
    #[error("Snapshot source unreadable: {0}")]
    ProviderUnreadable(String),

    /// The source was read but no line carried pid, comm and energy
    #[error("No qualifying entries in snapshot ({} bytes of source text)", .raw_text.len())]
    NoEntries { raw_text: String },

    /// The delivery channel failed (timeout, worker panic, ...)
    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
