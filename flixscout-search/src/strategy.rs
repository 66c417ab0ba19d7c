//! Per-source dispatch of fetch and extraction strategies.
//!
//! Some sources need their own fetcher (a legacy site, a video host) or
//! their own extractor. [`FetchStrategies`] and [`ExtractStrategies`] pick
//! the implementation by source id once per task and fall back to a
//! default for everything else.

use crate::backend::{Extractor, FetchMode, Fetcher};
use crate::error::{FetchError, SearchError};
use crate::types::{ResultItem, Source};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Fetcher that dispatches to a per-source implementation.
#[derive(Clone)]
pub struct FetchStrategies {
    default: Arc<dyn Fetcher>,
    by_source: HashMap<String, Arc<dyn Fetcher>>,
}

impl FetchStrategies {
    pub fn new(default: Arc<dyn Fetcher>) -> Self {
        Self {
            default,
            by_source: HashMap::new(),
        }
    }

    /// Route fetches for `source_id` to `fetcher`.
    pub fn with_source(mut self, source_id: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        self.by_source.insert(source_id.into(), fetcher);
        self
    }

    pub fn resolve(&self, source_id: &str) -> &Arc<dyn Fetcher> {
        self.by_source.get(source_id).unwrap_or(&self.default)
    }
}

#[async_trait]
impl Fetcher for FetchStrategies {
    async fn fetch(
        &self,
        source: &Source,
        address: &str,
        mode: FetchMode,
    ) -> Result<String, FetchError> {
        self.resolve(&source.id).fetch(source, address, mode).await
    }
}

/// Extractor that dispatches to a per-source implementation.
#[derive(Clone)]
pub struct ExtractStrategies {
    default: Arc<dyn Extractor>,
    by_source: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractStrategies {
    pub fn new(default: Arc<dyn Extractor>) -> Self {
        Self {
            default,
            by_source: HashMap::new(),
        }
    }

    pub fn with_source(
        mut self,
        source_id: impl Into<String>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        self.by_source.insert(source_id.into(), extractor);
        self
    }

    pub fn resolve(&self, source_id: &str) -> &Arc<dyn Extractor> {
        self.by_source.get(source_id).unwrap_or(&self.default)
    }
}

impl Extractor for ExtractStrategies {
    fn extract_search_results(
        &self,
        source: &Source,
        content: &str,
    ) -> Result<Vec<ResultItem>, SearchError> {
        self.resolve(&source.id)
            .extract_search_results(source, content)
    }
}
