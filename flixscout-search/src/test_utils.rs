//! Shared test doubles for the orchestrator unit tests.

use crate::backend::{Collaborators, Extractor, FetchMode, Fetcher, HealthTracker, SourceRegistry};
use crate::error::{FetchError, SearchError};
use crate::orchestrator::key::dedup_key;
use crate::types::{ContentType, ResultItem, Source, Task};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted reply for one (address, mode) pair.
#[derive(Debug, Clone)]
pub enum Reply {
    Content(String),
    ContentAfter(Duration, String),
    Fail(FetchError),
    Hang,
}

/// Fetcher answering from a script keyed by address and mode.
/// Unscripted addresses fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedFetcher {
    strict: Mutex<HashMap<String, Reply>>,
    fallback: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, FetchMode)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(self, address: &str, reply: Reply) -> Self {
        self.strict
            .lock()
            .expect("script lock")
            .insert(address.to_owned(), reply);
        self
    }

    pub fn fallback(self, address: &str, reply: Reply) -> Self {
        self.fallback
            .lock()
            .expect("script lock")
            .insert(address.to_owned(), reply);
        self
    }

    pub fn calls(&self) -> Vec<(String, FetchMode)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _source: &Source,
        address: &str,
        mode: FetchMode,
    ) -> Result<String, FetchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((address.to_owned(), mode));

        let reply = match mode {
            FetchMode::Strict => self.strict.lock().expect("script lock").get(address).cloned(),
            FetchMode::Fallback => self
                .fallback
                .lock()
                .expect("script lock")
                .get(address)
                .cloned(),
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = match reply {
            Some(Reply::Content(body)) => Ok(body),
            Some(Reply::ContentAfter(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending::<Result<String, FetchError>>().await,
            None => Err(FetchError::NotFound),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Extractor reading one `key|title` pair per line. The body `!` fails.
pub struct LineExtractor;

impl Extractor for LineExtractor {
    fn extract_search_results(
        &self,
        source: &Source,
        content: &str,
    ) -> Result<Vec<ResultItem>, SearchError> {
        if content.trim() == "!" {
            return Err(SearchError::Extraction("unparseable test content".into()));
        }
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let (key, title) = line.split_once('|').unwrap_or(("", line));
                make_item(key, &source.id, title)
            })
            .collect())
    }
}

pub fn make_item(key: &str, source_id: &str, title: &str) -> ResultItem {
    ResultItem {
        title: title.to_owned(),
        poster_address: String::new(),
        page_address: format!("https://{source_id}.test/{}", dedup_key(title, None)),
        content_type: ContentType::Film,
        year: None,
        dedup_key: key.to_owned(),
        source_id: source_id.to_owned(),
        source_label: source_id.to_uppercase(),
        categories: Vec::new(),
        alternative_sources: Vec::new(),
    }
}

pub struct StaticRegistry(pub Vec<Arc<Source>>);

impl SourceRegistry for StaticRegistry {
    fn enabled_searchable_sources(&self) -> Vec<Arc<Source>> {
        self.0.iter().filter(|s| s.is_searchable()).cloned().collect()
    }
}

/// Health tracker recording `(source_id, success)` pairs.
#[derive(Default)]
pub struct RecordingHealth(pub Mutex<Vec<(String, bool)>>);

impl RecordingHealth {
    pub fn events(&self) -> Vec<(String, bool)> {
        self.0.lock().expect("health lock").clone()
    }
}

impl HealthTracker for RecordingHealth {
    fn record_success(&self, source: &Source) {
        self.0
            .lock()
            .expect("health lock")
            .push((source.id.clone(), true));
    }

    fn record_failure(&self, source: &Source) {
        self.0
            .lock()
            .expect("health lock")
            .push((source.id.clone(), false));
    }
}

/// Source `id` with priority `priority` at `https://<id>.test`.
pub fn source(id: &str, priority: u32) -> Arc<Source> {
    Arc::new(Source::new(id, id.to_uppercase(), format!("https://{id}.test")).with_priority(priority))
}

/// The address the default template builds for `id` and `query`.
pub fn address(id: &str, query: &str) -> String {
    format!("https://{id}.test/?s={}", urlencoding::encode(query))
}

pub fn task(id: &str, priority: u32, query: &str) -> Task {
    Task::new(source(id, priority), address(id, query))
}

pub fn collaborators(
    sources: Vec<Arc<Source>>,
    fetcher: Arc<ScriptedFetcher>,
    health: Arc<RecordingHealth>,
) -> Collaborators {
    Collaborators::new(
        Arc::new(StaticRegistry(sources)),
        fetcher,
        Arc::new(LineExtractor),
    )
    .with_health(health)
}
