//! Task builder: expands (source, query) pairs into fetch tasks.
//!
//! Pure function of its inputs; no I/O happens here.

use std::sync::Arc;

use crate::types::{Enrichment, Source, SubQuery, Task};

/// Address pattern used by sources that declare no template.
pub const DEFAULT_TEMPLATE: &str = "{base}/?s={query}";

/// Build one task per searchable source, or one per declared sub-query.
///
/// Tasks keep the order of `sources`, which the registry hands out in
/// priority order; the deduplicator's tie-break depends on that.
///
/// When `enrichment` names a content type, sub-queries typed for a
/// different content type are skipped. If that would leave a source with
/// no sub-query at all, every sub-query of that source is kept.
pub fn build_tasks(
    sources: &[Arc<Source>],
    query: &str,
    enrichment: Option<&Enrichment>,
) -> Vec<Task> {
    let encoded = urlencoding::encode(query.trim());
    let wanted = enrichment.and_then(|e| e.content_type);

    let mut tasks = Vec::new();
    for source in sources.iter().filter(|s| s.is_searchable()) {
        if source.sub_queries.is_empty() {
            let template = source.search_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
            tasks.push(Task::new(
                Arc::clone(source),
                render(template, &source.base_url, &encoded),
            ));
            continue;
        }

        let matching: Vec<&SubQuery> = source
            .sub_queries
            .iter()
            .filter(|sq| match (wanted, sq.content_type) {
                (Some(wanted), Some(kind)) => wanted == kind,
                _ => true,
            })
            .collect();
        let selected: Vec<&SubQuery> = if matching.is_empty() {
            source.sub_queries.iter().collect()
        } else {
            matching
        };

        for sub_query in selected {
            tracing::trace!(source = %source.id, sub_query = %sub_query.label, "sub-query task");
            tasks.push(Task::new(
                Arc::clone(source),
                render(&sub_query.template, &source.base_url, &encoded),
            ));
        }
    }
    tasks
}

/// Substitute `{base}` and `{query}`. A template that renders to a bare
/// path is resolved against the base address.
fn render(template: &str, base_url: &str, encoded_query: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let rendered = template
        .replace("{base}", base)
        .replace("{query}", encoded_query);

    if rendered.starts_with('/') {
        format!("{base}{rendered}")
    } else {
        rendered
    }
}
