//! Search orchestrator: task building, the two fetch phases, dedup, and
//! the observable state machine.
//!
//! A query is expanded into tasks, fetched concurrently in strict mode,
//! deduplicated, and, for sources blocked by bot protection, retried one
//! at a time in fallback mode.

pub mod dedup;
pub mod escalation;
pub mod fast;
pub mod key;
pub mod service;
pub mod tasks;

use std::sync::Arc;

use crate::backend::Collaborators;
use crate::types::{ResultItem, Task};

/// Extract items from fetched content and hand them to the sink.
///
/// An extraction failure counts as zero results for this task only. The
/// sink runs on the blocking pool so a slow write never stalls a worker.
pub(crate) async fn harvest(task: &Task, deps: &Collaborators, content: &str) -> Vec<ResultItem> {
    let items = match deps.extractor.extract_search_results(&task.source, content) {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(
                source = %task.source.id,
                address = %task.address,
                error = %err,
                "extraction failed; treating as zero results"
            );
            return Vec::new();
        }
    };

    tracing::debug!(source = %task.source.id, count = items.len(), "source returned results");

    if let Some(sink) = &deps.sink {
        if !items.is_empty() {
            let sink = Arc::clone(sink);
            let batch = items.clone();
            let source_id = task.source.id.clone();
            let persisted =
                tokio::task::spawn_blocking(move || sink.persist(&batch, &source_id)).await;
            match persisted {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(source = %task.source.id, error = %err, "result sink failed");
                }
                Err(err) => {
                    tracing::warn!(source = %task.source.id, error = %err, "result sink task panicked");
                }
            }
        }
    }

    items
}
