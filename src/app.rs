//! Wiring of the concrete collaborators into a running search service.

use std::sync::Arc;

use flixscout_search::{
    CircuitState, Collaborators, ExtractStrategies, Extractor, FetchStrategies, Fetcher,
    InMemorySourceRegistry, SearchService, SourceHealth,
};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;
use crate::extract::SelectorExtractor;
use crate::fetch::HttpFetcher;
use crate::sink::JsonlResultSink;

/// A started search service plus the pieces the host bridge reports on.
#[derive(Clone)]
pub struct App {
    service: SearchService,
    registry: Arc<InMemorySourceRegistry>,
    health: Arc<SourceHealth>,
}

/// Row of `sources.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub label: String,
    pub enabled: bool,
    pub searchable: bool,
    pub priority: u32,
    pub requires_automation: bool,
    pub health: CircuitState,
}

/// Per-source replacements for the HTTP fetcher and the selector
/// extractor. Sources without an entry use the defaults.
#[derive(Default)]
pub struct SourceOverrides {
    fetchers: Vec<(String, Arc<dyn Fetcher>)>,
    extractors: Vec<(String, Arc<dyn Extractor>)>,
}

impl SourceOverrides {
    pub fn fetcher(mut self, source_id: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.push((source_id.into(), fetcher));
        self
    }

    pub fn extractor(
        mut self,
        source_id: impl Into<String>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        self.extractors.push((source_id.into(), extractor));
        self
    }

    fn warn_unknown(&self, config: &AppConfig) {
        let ids = self
            .fetchers
            .iter()
            .map(|(id, _)| id)
            .chain(self.extractors.iter().map(|(id, _)| id));
        for id in ids {
            if !config.sources.iter().any(|entry| &entry.source.id == id) {
                tracing::warn!(source = %id, "override for a source that is not configured");
            }
        }
    }
}

impl App {
    /// Build every collaborator from `config` and start the search service
    /// on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config, an unbuildable HTTP client,
    /// a selector that does not parse, or a sink file that cannot be opened.
    pub fn start(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.fetch, &config.engine)?;
        Self::start_with_overrides(config, Arc::new(fetcher), SourceOverrides::default())
    }

    /// Same as [`App::start`] with a caller-supplied fetcher.
    ///
    /// # Errors
    ///
    /// See [`App::start`].
    pub fn start_with_fetcher(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Self::start_with_overrides(config, fetcher, SourceOverrides::default())
    }

    /// Start with `fetcher` and the selector extractor as defaults, routing
    /// the sources named in `overrides` to their own implementations.
    ///
    /// # Errors
    ///
    /// See [`App::start`].
    pub fn start_with_overrides(
        config: &AppConfig,
        fetcher: Arc<dyn Fetcher>,
        overrides: SourceOverrides,
    ) -> Result<Self> {
        config.validate()?;
        overrides.warn_unknown(config);

        let health = Arc::new(SourceHealth::new(config.engine.health.clone()));
        let registry = Arc::new(InMemorySourceRegistry::new(
            config.source_definitions(),
            Arc::clone(&health),
        )?);

        let fetchers = overrides
            .fetchers
            .into_iter()
            .fold(FetchStrategies::new(fetcher), |acc, (id, f)| acc.with_source(id, f));
        let extractors = overrides.extractors.into_iter().fold(
            ExtractStrategies::new(Arc::new(SelectorExtractor::new(&config.sources)?)),
            |acc, (id, e)| acc.with_source(id, e),
        );

        let mut deps =
            Collaborators::new(registry.clone(), Arc::new(fetchers), Arc::new(extractors))
                .with_health(health.clone());
        if let Some(path) = &config.sink.path {
            let sink = JsonlResultSink::open(path)?;
            tracing::info!(path = %sink.path().display(), "persisting results");
            deps = deps.with_sink(Arc::new(sink));
        }

        let service = SearchService::start(deps, config.engine.clone())?;
        tracing::info!(sources = registry.list().len(), "search service started");

        Ok(Self {
            service,
            registry,
            health,
        })
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }

    /// Every configured source with its current health.
    pub fn sources(&self) -> Vec<SourceSummary> {
        self.registry
            .list()
            .iter()
            .map(|s| SourceSummary {
                id: s.id.clone(),
                label: s.label.clone(),
                enabled: s.enabled,
                searchable: s.searchable,
                priority: s.priority,
                requires_automation: s.requires_automation,
                health: self.health.status(&s.id),
            })
            .collect()
    }

    /// Stop the search service. Idempotent.
    pub fn shutdown(&self) {
        self.service.stop();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("sources", &self.registry.list().len())
            .field("stopped", &self.service.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Selectors, SourceEntry};
    use crate::error::AppError;
    use async_trait::async_trait;
    use flixscout_search::{FetchError, FetchMode, ResultItem, SearchError, SearchStatus, Source};

    struct PageFetcher;

    #[async_trait]
    impl Fetcher for PageFetcher {
        async fn fetch(
            &self,
            source: &Source,
            _address: &str,
            _mode: FetchMode,
        ) -> std::result::Result<String, FetchError> {
            Ok(format!(
                r#"<article><a href="/film/heat"><h2>Heat (1995)</h2></a></article>
                   <article><a href="/film/{id}"><h2>Only on {id}</h2></a></article>"#,
                id = source.id
            ))
        }
    }

    struct MirrorFetcher;

    #[async_trait]
    impl Fetcher for MirrorFetcher {
        async fn fetch(
            &self,
            _source: &Source,
            _address: &str,
            _mode: FetchMode,
        ) -> std::result::Result<String, FetchError> {
            Ok(r#"<article><a href="/film/ronin"><h2>Ronin (1998)</h2></a></article>"#.into())
        }
    }

    struct NothingExtractor;

    impl Extractor for NothingExtractor {
        fn extract_search_results(
            &self,
            _source: &Source,
            _content: &str,
        ) -> std::result::Result<Vec<ResultItem>, SearchError> {
            Ok(Vec::new())
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        for id in ["alpha", "beta"] {
            config.sources.push(SourceEntry {
                source: Source::new(id, id.to_uppercase(), format!("https://{id}.example")),
                selectors: Selectors::default(),
            });
        }
        config
    }

    #[tokio::test]
    async fn searches_through_configured_sources() {
        let app = App::start_with_fetcher(&config(), Arc::new(PageFetcher)).expect("start");

        app.service().search("heat", None).await.expect("search");
        let state = app.service().settled().await.expect("settled");

        assert_eq!(state.status, SearchStatus::Complete);
        let titles: Vec<&str> = state.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Heat", "Only on alpha", "Only on beta"]);
        assert_eq!(state.results[0].alternative_sources.len(), 1);
        assert_eq!(state.results[0].alternative_sources[0].source_id, "beta");
        app.shutdown();
    }

    #[tokio::test]
    async fn lists_sources_with_health() {
        let app = App::start_with_fetcher(&config(), Arc::new(PageFetcher)).expect("start");
        let sources = app.sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, "alpha");
        assert_eq!(sources[0].health, CircuitState::Closed);
        app.shutdown();
        assert!(app.service().is_stopped());
    }

    #[tokio::test]
    async fn duplicate_source_ids_are_rejected() {
        let mut config = config();
        config.sources.push(config.sources[0].clone());
        let err = App::start_with_fetcher(&config, Arc::new(PageFetcher)).expect_err("duplicate");
        assert!(matches!(err, AppError::Search(_)));
    }

    #[tokio::test]
    async fn sink_receives_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.jsonl");
        let mut config = config();
        config.sink.path = Some(path.clone());

        let app = App::start_with_fetcher(&config, Arc::new(PageFetcher)).expect("start");
        app.service().search("heat", None).await.expect("search");
        app.service().settled().await.expect("settled");
        app.shutdown();

        let written = std::fs::read_to_string(&path).expect("read sink");
        assert_eq!(written.lines().count(), 4);
    }

    #[tokio::test]
    async fn fetch_override_serves_only_its_source() {
        let overrides = SourceOverrides::default().fetcher("beta", Arc::new(MirrorFetcher));
        let app = App::start_with_overrides(&config(), Arc::new(PageFetcher), overrides)
            .expect("start");

        app.service().search("heat", None).await.expect("search");
        let state = app.service().settled().await.expect("settled");

        let titles: Vec<&str> = state.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Heat", "Only on alpha", "Ronin"]);
        assert!(state.results[0].alternative_sources.is_empty());
        assert_eq!(state.results[2].source_id, "beta");
        app.shutdown();
    }

    #[tokio::test]
    async fn extract_override_replaces_the_selector_extractor() {
        let overrides = SourceOverrides::default().extractor("alpha", Arc::new(NothingExtractor));
        let app = App::start_with_overrides(&config(), Arc::new(PageFetcher), overrides)
            .expect("start");

        app.service().search("heat", None).await.expect("search");
        let state = app.service().settled().await.expect("settled");

        let titles: Vec<&str> = state.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Heat", "Only on beta"]);
        assert_eq!(state.results[0].source_id, "beta");
        app.shutdown();
    }
}
