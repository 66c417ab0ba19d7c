//! Error types for the flixscout-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Fetch failures carry their own taxonomy
//! because only one of them (bot protection) changes orchestration.

/// Failure reported by a [`crate::backend::Fetcher`] for a single address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The source answered with an anti-automation challenge that strict
    /// fetching cannot pass.
    #[error("bot protection detected")]
    BotProtectionDetected,

    /// The fetch did not complete within its timeout.
    #[error("fetch timed out")]
    Timeout,

    /// Connection, TLS, or unexpected HTTP status failure.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The source reported that the address does not exist.
    #[error("not found")]
    NotFound,
}

impl FetchError {
    /// Whether this failure makes the task eligible for the fallback tier.
    pub fn is_escalatable(&self) -> bool {
        matches!(self, Self::BotProtectionDetected)
    }
}

/// Errors that can occur while orchestrating a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// No usable sources, or the query cannot be turned into work.
    #[error("setup error: {0}")]
    Setup(String),

    /// Invalid engine or registry configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A fetch failed.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Content for a single task could not be parsed into results.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A result sink failed to persist a batch.
    #[error("sink error: {0}")]
    Sink(String),

    /// Internal channel send/receive failure.
    #[error("channel error: {0}")]
    Channel(String),

    /// The search service has been stopped.
    #[error("search service stopped")]
    Stopped,
}

/// Convenience type alias for flixscout-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
