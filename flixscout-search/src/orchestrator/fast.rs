//! Fast phase: every task fetched concurrently in strict mode.
//!
//! A fixed-size pool of in-flight fetches works through the task list
//! under one phase-wide deadline. Each task also has its own strict
//! timeout. Results land in a mutex-protected buffer with one slot per
//! task, so whatever finished before the deadline survives it and the
//! output is always in task (priority) order, not completion order.

use std::sync::{Mutex, MutexGuard};

use futures::stream::{self, StreamExt};

use crate::backend::{Collaborators, FetchMode};
use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::types::{ResultItem, Task};

use super::harvest;

/// What the fast phase produced.
#[derive(Debug, Default)]
pub struct FastOutcome {
    /// Items of every successful task, in task order, not yet deduplicated.
    pub results: Vec<ResultItem>,
    /// Tasks blocked by bot protection, in task order.
    pub escalatable: Vec<Task>,
    /// Tasks still running, or never started, when the phase deadline
    /// expired.
    pub timed_out: usize,
}

enum Slot {
    Pending,
    InFlight,
    Done(Vec<ResultItem>),
    Escalate,
    Failed,
}

/// Run all tasks through the fetcher in strict mode.
///
/// Returns once every task has finished or the phase deadline has passed,
/// whichever comes first. Tasks cut off by the deadline are never
/// escalated; only those whose fetch had started count against the
/// source's health.
pub async fn run_fast(tasks: Vec<Task>, deps: &Collaborators, config: &EngineConfig) -> FastOutcome {
    let slots: Mutex<Vec<Slot>> = Mutex::new(tasks.iter().map(|_| Slot::Pending).collect());
    let strict_timeout = config.strict_timeout();

    let work = stream::iter(tasks.iter().enumerate()).for_each_concurrent(
        config.worker_pool_size,
        |(index, task)| {
            let slots = &slots;
            async move {
                lock(slots)[index] = Slot::InFlight;
                let fetched = tokio::time::timeout(
                    strict_timeout,
                    deps.fetcher.fetch(&task.source, &task.address, FetchMode::Strict),
                )
                .await
                .unwrap_or(Err(FetchError::Timeout));

                let slot = match fetched {
                    Ok(content) => {
                        deps.health.record_success(&task.source);
                        Slot::Done(harvest(task, deps, &content).await)
                    }
                    Err(FetchError::BotProtectionDetected) => {
                        tracing::debug!(source = %task.source.id, "bot protection; deferring to fallback");
                        Slot::Escalate
                    }
                    Err(err) => {
                        tracing::warn!(source = %task.source.id, error = %err, "strict fetch failed");
                        deps.health.record_failure(&task.source);
                        Slot::Failed
                    }
                };
                lock(slots)[index] = slot;
            }
        },
    );

    if tokio::time::timeout(config.fast_phase_deadline(), work)
        .await
        .is_err()
    {
        tracing::warn!(
            deadline_secs = config.fast_phase_deadline_secs,
            "fast phase deadline reached; keeping partial results"
        );
    }

    let slots = std::mem::take(&mut *lock(&slots));
    let mut outcome = FastOutcome::default();
    for (slot, task) in slots.into_iter().zip(tasks) {
        match slot {
            Slot::Done(items) => outcome.results.extend(items),
            Slot::Escalate => outcome.escalatable.push(task),
            Slot::Failed => {}
            Slot::InFlight => {
                tracing::warn!(source = %task.source.id, "task cut off by fast phase deadline");
                deps.health.record_failure(&task.source);
                outcome.timed_out += 1;
            }
            Slot::Pending => {
                tracing::debug!(source = %task.source.id, "task never started before the deadline");
                outcome.timed_out += 1;
            }
        }
    }

    tracing::debug!(
        results = outcome.results.len(),
        escalatable = outcome.escalatable.len(),
        timed_out = outcome.timed_out,
        "fast phase finished"
    );
    outcome
}

fn lock(slots: &Mutex<Vec<Slot>>) -> MutexGuard<'_, Vec<Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
