//! # flixscout-search
//!
//! Search orchestration for FlixScout: one query fanned out across many
//! content sources, deduplicated, and surfaced as a single observable
//! [`SearchState`].
//!
//! ## Design
//!
//! - A fast phase fetches every source concurrently in strict mode, with a
//!   bounded worker pool and one phase-wide deadline
//! - Sources that answer with bot protection are retried later, one at a
//!   time, in fallback mode
//! - Results sharing a dedup key collapse into the first-seen item, which
//!   records the others as alternative sources
//! - Fetching, extraction, source listing and health tracking are supplied
//!   by the host through the traits in [`backend`]
//!
//! ## Usage
//!
//! ```no_run
//! # async fn example(deps: flixscout_search::Collaborators) -> flixscout_search::Result<()> {
//! use flixscout_search::{EngineConfig, SearchService, SearchStatus};
//!
//! let service = SearchService::start(deps, EngineConfig::default())?;
//! service.search("dune", None).await?;
//! let state = service.settled().await?;
//! if state.status == SearchStatus::Partial {
//!     service.load_more().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod strategy;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{
    Collaborators, Extractor, FetchMode, Fetcher, HealthTracker, NoopHealth, ResultSink,
    SourceRegistry,
};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState, HealthReportEntry, SourceHealth};
pub use config::EngineConfig;
pub use error::{FetchError, Result, SearchError};
pub use orchestrator::dedup::merge;
pub use orchestrator::key::dedup_key;
pub use orchestrator::service::SearchService;
pub use orchestrator::tasks::build_tasks;
pub use registry::InMemorySourceRegistry;
pub use strategy::{ExtractStrategies, FetchStrategies};
pub use types::{
    AlternativeSource, ContentType, Enrichment, ResultItem, SearchState, SearchStatus, Source,
    SubQuery, Task,
};
