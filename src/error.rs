//! Error types for the flixscout application layer.

use flixscout_search::SearchError;

/// Top-level error type for the host application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file missing fields, unparsable, or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the search engine.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Malformed or unsupported host bridge command.
    #[error("bridge error: {0}")]
    Bridge(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
