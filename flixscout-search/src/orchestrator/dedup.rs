//! Order-preserving result deduplication by dedup key.
//!
//! Folds `base` then `incoming` into one list. The first item seen for a
//! key becomes the primary; later items with the same key are recorded
//! as alternative sources of that primary instead of being listed again.
//! Because the runners hand results over in source priority order, the
//! primary is always the one from the highest-priority source.

use std::collections::HashMap;

use crate::types::{AlternativeSource, ResultItem};

/// Merge two result lists, collapsing items that share a non-empty key.
///
/// - Items with an empty `dedup_key` are always appended.
/// - A duplicate's own `alternative_sources` are carried over after it,
///   so merging is associative.
/// - An alternative identical to the primary or to an alternative already
///   recorded is not added twice.
pub fn merge(base: &[ResultItem], incoming: &[ResultItem]) -> Vec<ResultItem> {
    let mut merged: Vec<ResultItem> = Vec::with_capacity(base.len() + incoming.len());
    // Map from dedup key → index of the primary in `merged`.
    let mut primaries: HashMap<String, usize> = HashMap::new();

    for item in base.iter().chain(incoming) {
        if item.dedup_key.is_empty() {
            merged.push(item.clone());
            continue;
        }

        match primaries.get(&item.dedup_key) {
            Some(&index) => {
                let primary = &mut merged[index];
                absorb(primary, item.as_alternative());
                for alternative in &item.alternative_sources {
                    absorb(primary, alternative.clone());
                }
            }
            None => {
                primaries.insert(item.dedup_key.clone(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}

fn absorb(primary: &mut ResultItem, alternative: AlternativeSource) {
    let is_primary = alternative.source_id == primary.source_id
        && alternative.page_address == primary.page_address;
    if is_primary || primary.alternative_sources.contains(&alternative) {
        return;
    }
    primary.alternative_sources.push(alternative);
}
