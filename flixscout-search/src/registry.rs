//! In-memory source registry with health-based demotion.

use crate::backend::SourceRegistry;
use crate::circuit_breaker::SourceHealth;
use crate::error::SearchError;
use crate::types::Source;
use std::collections::HashSet;
use std::sync::Arc;

/// Fixed list of sources, ordered for searching by health and priority.
///
/// Sources whose circuit is open are ranked after every healthy source;
/// within each group lower `priority` comes first and ties break on id,
/// so the ordering (and with it the dedup tie-break) is deterministic.
#[derive(Debug)]
pub struct InMemorySourceRegistry {
    sources: Vec<Arc<Source>>,
    health: Arc<SourceHealth>,
}

impl InMemorySourceRegistry {
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an empty id, an empty base URL,
    /// or a duplicate id.
    pub fn new(sources: Vec<Source>, health: Arc<SourceHealth>) -> Result<Self, SearchError> {
        let mut seen = HashSet::new();
        for source in &sources {
            if source.id.trim().is_empty() {
                return Err(SearchError::Config("source id must not be empty".into()));
            }
            if source.base_url.trim().is_empty() {
                return Err(SearchError::Config(format!(
                    "source {} has an empty base_url",
                    source.id
                )));
            }
            if !seen.insert(source.id.clone()) {
                return Err(SearchError::Config(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
        }

        Ok(Self {
            sources: sources.into_iter().map(Arc::new).collect(),
            health,
        })
    }

    /// Every registered source in declaration order, searchable or not.
    pub fn list(&self) -> &[Arc<Source>] {
        &self.sources
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.health
    }
}

impl SourceRegistry for InMemorySourceRegistry {
    fn enabled_searchable_sources(&self) -> Vec<Arc<Source>> {
        let mut ranked: Vec<(bool, Arc<Source>)> = self
            .sources
            .iter()
            .filter(|s| s.is_searchable())
            .map(|s| (self.health.is_demoted(&s.id), Arc::clone(s)))
            .collect();

        ranked.sort_by(|(a_demoted, a), (b_demoted, b)| {
            a_demoted
                .cmp(b_demoted)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.id.cmp(&b.id))
        });

        ranked.into_iter().map(|(_, s)| s).collect()
    }
}
