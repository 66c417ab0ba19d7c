//! Escalation phase: blocked tasks retried one at a time in fallback mode.
//!
//! Fallback fetches share one heavy automation resource, so they never run
//! concurrently. Progress is reported as a stream of `LoadingMore` states
//! followed by a terminal `Complete`.

use futures::Stream;

use crate::backend::{Collaborators, FetchMode};
use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::types::{ResultItem, SearchState, Task};

use super::dedup::merge;
use super::harvest;

/// Retry `tasks` sequentially in fallback mode on top of `base`.
///
/// Yields one `LoadingMore` state after every task, success or failure,
/// with `pending_count` set to the tasks still to run, then a final
/// `Complete` state holding everything merged. A failing task is recorded
/// against the source's health and skipped.
pub fn run_escalated(
    query: String,
    tasks: Vec<Task>,
    base: Vec<ResultItem>,
    deps: Collaborators,
    config: &EngineConfig,
) -> impl Stream<Item = SearchState> + Send + 'static {
    let fallback_timeout = config.fallback_timeout();

    async_stream::stream! {
        let total = tasks.len();
        let mut accumulated: Vec<ResultItem> = Vec::new();

        for (done, task) in tasks.into_iter().enumerate() {
            let fetched = tokio::time::timeout(
                fallback_timeout,
                deps.fetcher.fetch(&task.source, &task.address, FetchMode::Fallback),
            )
            .await
            .unwrap_or(Err(FetchError::Timeout));

            match fetched {
                Ok(content) => {
                    deps.health.record_success(&task.source);
                    accumulated.extend(harvest(&task, &deps, &content).await);
                }
                Err(err) => {
                    tracing::warn!(source = %task.source.id, error = %err, "fallback fetch failed");
                    deps.health.record_failure(&task.source);
                }
            }

            let remaining = total - done - 1;
            yield SearchState::loading_more(&query, merge(&base, &accumulated), remaining);
        }

        tracing::debug!(tasks = total, "escalation finished");
        yield SearchState::complete(&query, merge(&base, &accumulated));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        address, collaborators, make_item, task, RecordingHealth, Reply, ScriptedFetcher,
    };
    use crate::types::SearchStatus;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig {
            fallback_timeout_secs: 30,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_progress_then_complete() {
        let fetcher = ScriptedFetcher::new()
            .fallback(&address("one", "q"), Reply::Content("x|X one".into()))
            .fallback(&address("two", "q"), Reply::Content("y|Y two".into()));
        let deps = collaborators(vec![], Arc::new(fetcher), Arc::default());

        let states: Vec<SearchState> = run_escalated(
            "q".into(),
            vec![task("one", 1, "q"), task("two", 2, "q")],
            vec![make_item("base", "zero", "Base")],
            deps,
            &config(),
        )
        .collect()
        .await;

        let shape: Vec<(SearchStatus, usize, usize)> = states
            .iter()
            .map(|s| (s.status, s.pending_count, s.results.len()))
            .collect();
        assert_eq!(
            shape,
            [
                (SearchStatus::LoadingMore, 1, 2),
                (SearchStatus::LoadingMore, 0, 3),
                (SearchStatus::Complete, 0, 3),
            ]
        );
        assert_eq!(states[2].results[0].dedup_key, "base");
    }

    #[tokio::test(start_paused = true)]
    async fn runs_strictly_one_at_a_time_in_fallback_mode() {
        let mut fetcher = ScriptedFetcher::new();
        let mut tasks = Vec::new();
        for i in 0..4u32 {
            let id = format!("s{i}");
            fetcher = fetcher.fallback(
                &address(&id, "q"),
                Reply::ContentAfter(Duration::from_millis(500), format!("{id}|{id}")),
            );
            tasks.push(task(&id, i, "q"));
        }
        let fetcher = Arc::new(fetcher);
        let deps = collaborators(vec![], Arc::clone(&fetcher), Arc::default());

        let last = run_escalated("q".into(), tasks, vec![], deps, &config())
            .collect::<Vec<_>>()
            .await
            .pop()
            .expect("terminal state");

        assert_eq!(last.status, SearchStatus::Complete);
        assert_eq!(fetcher.max_in_flight(), 1);
        let order: Vec<String> = fetcher.calls().into_iter().map(|(a, _)| a).collect();
        assert_eq!(order, (0..4).map(|i| address(&format!("s{i}"), "q")).collect::<Vec<_>>());
        assert!(fetcher.calls().iter().all(|(_, mode)| *mode == FetchMode::Fallback));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_move_on_and_hit_health() {
        let fetcher = ScriptedFetcher::new()
            .fallback(&address("bad", "q"), Reply::Fail(FetchError::BotProtectionDetected))
            .fallback(&address("slow", "q"), Reply::Hang)
            .fallback(&address("good", "q"), Reply::Content("g|Good".into()));
        let health = Arc::new(RecordingHealth::default());
        let deps = collaborators(vec![], Arc::new(fetcher), Arc::clone(&health));

        let states: Vec<SearchState> = run_escalated(
            "q".into(),
            vec![task("bad", 1, "q"), task("slow", 2, "q"), task("good", 3, "q")],
            vec![],
            deps,
            &config(),
        )
        .collect()
        .await;

        assert_eq!(states.len(), 4);
        let last = states.last().expect("terminal state");
        assert_eq!(last.status, SearchStatus::Complete);
        assert_eq!(last.results.len(), 1);
        assert_eq!(last.results[0].source_id, "good");
        assert_eq!(
            health.events(),
            [
                ("bad".to_string(), false),
                ("slow".to_string(), false),
                ("good".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn no_tasks_completes_with_base() {
        let deps = collaborators(vec![], Arc::new(ScriptedFetcher::new()), Arc::default());
        let states: Vec<SearchState> = run_escalated(
            "q".into(),
            vec![],
            vec![make_item("k", "a", "K")],
            deps,
            &config(),
        )
        .collect()
        .await;

        assert_eq!(states, [SearchState::complete("q", vec![make_item("k", "a", "K")])]);
    }

    #[tokio::test(start_paused = true)]
    async fn escalated_duplicates_become_alternatives_of_base() {
        let fetcher = ScriptedFetcher::new()
            .fallback(&address("late", "q"), Reply::Content("dune|Dune".into()));
        let deps = collaborators(vec![], Arc::new(fetcher), Arc::default());

        let last = run_escalated(
            "q".into(),
            vec![task("late", 2, "q")],
            vec![make_item("dune", "early", "Dune")],
            deps,
            &config(),
        )
        .collect::<Vec<_>>()
        .await
        .pop()
        .expect("terminal state");

        assert_eq!(last.results.len(), 1);
        assert_eq!(last.results[0].source_id, "early");
        assert_eq!(last.results[0].alternative_sources[0].source_id, "late");
    }
}
