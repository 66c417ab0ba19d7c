//! Core types: sources, fetch tasks, result items, and the observable
//! search state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of content a result or sub-query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Film,
    Series,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Film => "film",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A separate search endpoint declared by a source, e.g. one for films
/// and one for series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Short name used in logs.
    pub label: String,
    /// Address template; `{base}` and `{query}` are substituted.
    pub template: String,
    /// Content type this endpoint returns, if it is restricted to one.
    #[serde(default)]
    pub content_type: Option<ContentType>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

/// One content website integrated into the search.
///
/// Read-only from the orchestrator's point of view. Lower `priority`
/// values are searched and deduplicated first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub label: String,
    pub base_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub searchable: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Hint that plain HTTP fetching is known not to get through.
    #[serde(default)]
    pub requires_automation: bool,
    /// Query address template; `{base}` and `{query}` are substituted.
    #[serde(default)]
    pub search_template: Option<String>,
    #[serde(default)]
    pub sub_queries: Vec<SubQuery>,
}

impl Source {
    /// Create an enabled, searchable source with default priority.
    pub fn new(id: impl Into<String>, label: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            base_url: base_url.into(),
            enabled: true,
            searchable: true,
            priority: default_priority(),
            requires_automation: false,
            search_template: None,
            sub_queries: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.search_template = Some(template.into());
        self
    }

    pub fn with_sub_query(mut self, sub_query: SubQuery) -> Self {
        self.sub_queries.push(sub_query);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn requiring_automation(mut self) -> Self {
        self.requires_automation = true;
        self
    }

    /// Whether the source takes part in query searches at all.
    pub fn is_searchable(&self) -> bool {
        self.enabled && self.searchable
    }
}

/// One unit of fetch work. Immutable once built.
#[derive(Debug, Clone)]
pub struct Task {
    pub source: Arc<Source>,
    pub address: String,
}

impl Task {
    pub fn new(source: Arc<Source>, address: impl Into<String>) -> Self {
        Self {
            source,
            address: address.into(),
        }
    }
}

/// Another source that returned the same content as a primary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeSource {
    pub source_id: String,
    pub source_label: String,
    pub page_address: String,
}

/// One discovered piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub poster_address: String,
    pub page_address: String,
    pub content_type: ContentType,
    pub year: Option<u16>,
    /// Identity across sources; empty means the item is never merged.
    pub dedup_key: String,
    pub source_id: String,
    pub source_label: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub alternative_sources: Vec<AlternativeSource>,
}

impl ResultItem {
    /// The `{source, page}` identity recorded when this item is absorbed
    /// into another as a duplicate.
    pub fn as_alternative(&self) -> AlternativeSource {
        AlternativeSource {
            source_id: self.source_id.clone(),
            source_label: self.source_label.clone(),
            page_address: self.page_address.clone(),
        }
    }
}

/// Optional caller-supplied metadata about the title being searched for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub original_title: Option<String>,
}

/// Lifecycle status of the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Idle,
    Loading,
    Partial,
    LoadingMore,
    Complete,
    Error,
}

impl SearchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Partial => "partial",
            Self::LoadingMore => "loading_more",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// No automatic transition follows these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single coherent snapshot exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    pub status: SearchStatus,
    pub query: String,
    pub results: Vec<ResultItem>,
    /// Distinct sources awaiting escalation while `Partial`; remaining
    /// escalation tasks while `LoadingMore`.
    pub pending_count: usize,
    pub error_message: Option<String>,
}

impl Default for SearchState {
    fn default() -> Self {
        Self::idle()
    }
}

impl SearchState {
    pub fn idle() -> Self {
        Self {
            status: SearchStatus::Idle,
            query: String::new(),
            results: Vec::new(),
            pending_count: 0,
            error_message: None,
        }
    }

    pub fn loading(query: &str) -> Self {
        Self {
            status: SearchStatus::Loading,
            query: query.to_owned(),
            ..Self::idle()
        }
    }

    pub fn partial(query: &str, results: Vec<ResultItem>, pending_count: usize) -> Self {
        Self {
            status: SearchStatus::Partial,
            query: query.to_owned(),
            results,
            pending_count,
            error_message: None,
        }
    }

    pub fn loading_more(query: &str, results: Vec<ResultItem>, pending_count: usize) -> Self {
        Self {
            status: SearchStatus::LoadingMore,
            query: query.to_owned(),
            results,
            pending_count,
            error_message: None,
        }
    }

    pub fn complete(query: &str, results: Vec<ResultItem>) -> Self {
        Self {
            status: SearchStatus::Complete,
            query: query.to_owned(),
            results,
            pending_count: 0,
            error_message: None,
        }
    }

    pub fn error(query: &str, message: impl Into<String>) -> Self {
        Self {
            status: SearchStatus::Error,
            query: query.to_owned(),
            error_message: Some(message.into()),
            ..Self::idle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_defaults_from_toml_like_json() {
        let json = r#"{"id":"alpha","label":"Alpha","base_url":"https://alpha.test"}"#;
        let source: Source = serde_json::from_str(json).expect("deserialize");
        assert!(source.enabled);
        assert!(source.searchable);
        assert_eq!(source.priority, 100);
        assert!(!source.requires_automation);
        assert!(source.sub_queries.is_empty());
    }

    #[test]
    fn disabled_source_is_not_searchable() {
        let source = Source::new("a", "A", "https://a.test").disabled();
        assert!(!source.is_searchable());
    }

    #[test]
    fn content_type_serialises_lowercase() {
        let json = serde_json::to_string(&ContentType::Series).expect("serialize");
        assert_eq!(json, "\"series\"");
    }

    #[test]
    fn search_status_serialises_snake_case() {
        let json = serde_json::to_string(&SearchStatus::LoadingMore).expect("serialize");
        assert_eq!(json, "\"loading_more\"");
        assert_eq!(SearchStatus::LoadingMore.to_string(), "loading_more");
    }

    #[test]
    fn terminal_statuses() {
        assert!(SearchStatus::Complete.is_terminal());
        assert!(SearchStatus::Error.is_terminal());
        assert!(!SearchStatus::Partial.is_terminal());
        assert!(!SearchStatus::LoadingMore.is_terminal());
    }

    #[test]
    fn error_state_carries_message_only() {
        let state = SearchState::error("dune", "no sources are enabled for search");
        assert_eq!(state.status, SearchStatus::Error);
        assert_eq!(state.query, "dune");
        assert!(state.results.is_empty());
        assert_eq!(
            state.error_message.as_deref(),
            Some("no sources are enabled for search")
        );
    }

    #[test]
    fn idle_state_has_empty_query() {
        let state = SearchState::default();
        assert_eq!(state.status, SearchStatus::Idle);
        assert!(state.query.is_empty());
        assert!(state.error_message.is_none());
    }
}
