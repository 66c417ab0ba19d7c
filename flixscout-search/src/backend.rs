//! Collaborator traits consumed by the orchestrator.
//!
//! Fetching, extraction, the source registry, health tracking and result
//! persistence are implemented outside this crate. The orchestrator only
//! sees them through these traits, bundled in [`Collaborators`].
//!
//! All implementations must be `Send + Sync`; they are shared between
//! concurrent fast-phase workers.

use crate::error::{FetchError, SearchError};
use crate::types::{ResultItem, Source};
use async_trait::async_trait;
use std::sync::Arc;

/// How hard a [`Fetcher`] may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// No heavy browser automation; short timeout.
    Strict,
    /// Full automation permitted; longer timeout.
    Fallback,
}

impl FetchMode {
    pub fn allows_automation(self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// Retrieves raw content for an address of a source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `address` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BotProtectionDetected`] when the source served
    /// an anti-automation challenge; the other variants for ordinary failures.
    async fn fetch(&self, source: &Source, address: &str, mode: FetchMode)
        -> Result<String, FetchError>;
}

/// Turns raw content of a source into result items.
pub trait Extractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SearchError::Extraction`] when the content cannot be parsed.
    fn extract_search_results(
        &self,
        source: &Source,
        content: &str,
    ) -> Result<Vec<ResultItem>, SearchError>;
}

/// Enumerates the sources a query should be sent to.
pub trait SourceRegistry: Send + Sync {
    /// Enabled, searchable sources in priority order.
    fn enabled_searchable_sources(&self) -> Vec<Arc<Source>>;
}

/// Fire-and-forget per-source outcome reporting.
pub trait HealthTracker: Send + Sync {
    fn record_success(&self, source: &Source);
    fn record_failure(&self, source: &Source);
}

/// Optional durability hook for discovered items.
pub trait ResultSink: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SearchError::Sink`] on failure. The orchestrator logs and
    /// otherwise ignores it.
    fn persist(&self, items: &[ResultItem], source_id: &str) -> Result<(), SearchError>;
}

/// Health tracker that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHealth;

impl HealthTracker for NoopHealth {
    fn record_success(&self, _source: &Source) {}
    fn record_failure(&self, _source: &Source) {}
}

/// Everything the orchestrator needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn SourceRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub health: Arc<dyn HealthTracker>,
    pub sink: Option<Arc<dyn ResultSink>>,
}

impl Collaborators {
    /// Bundle collaborators with no health tracking and no sink.
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            extractor,
            health: Arc::new(NoopHealth),
            sink: None,
        }
    }

    pub fn with_health(mut self, health: Arc<dyn HealthTracker>) -> Self {
        self.health = health;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}
