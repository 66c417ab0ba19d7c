//! The search state machine, run as a single actor task.
//!
//! [`SearchService`] is a cheap cloneable handle. Commands travel to the
//! actor over an mpsc channel; the actor is the only writer of the
//! [`SearchState`] and publishes every transition on a watch channel
//! (latest value) and a broadcast channel (every value).
//!
//! Each `search()` or `clear()` bumps a generation counter. Phase tasks
//! tag everything they send back with the generation they were started
//! under, and the actor drops messages from older generations, so a
//! superseded query can never overwrite the visible state.

use std::collections::HashSet;
use std::pin::pin;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::Collaborators;
use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use crate::types::{Enrichment, ResultItem, SearchState, SearchStatus, Task};

use super::dedup::merge;
use super::escalation::run_escalated;
use super::fast::{run_fast, FastOutcome};
use super::tasks::build_tasks;

const COMMAND_BUFFER: usize = 32;

enum Command {
    Search {
        query: String,
        enrichment: Option<Enrichment>,
        reply: oneshot::Sender<()>,
    },
    LoadMore {
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

struct PhaseMessage {
    generation: u64,
    event: PhaseEvent,
}

enum PhaseEvent {
    FastDone(FastOutcome),
    Escalation(SearchState),
}

/// Handle to a running search orchestrator.
#[derive(Clone)]
pub struct SearchService {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SearchState>,
    events: broadcast::Sender<SearchState>,
    cancel: CancellationToken,
}

impl SearchService {
    /// Validate `config` and spawn the orchestrator actor on the current
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid.
    pub fn start(deps: Collaborators, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(SearchState::idle());
        let (events, _) = broadcast::channel(config.state_buffer);
        let (phase_tx, phase_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = Actor {
            deps,
            config,
            generation: 0,
            state: SearchState::idle(),
            base: Vec::new(),
            escalatable: Vec::new(),
            phase: None,
            phase_tx,
            state_tx,
            events: events.clone(),
        };
        tokio::spawn(actor.run(command_rx, phase_rx, cancel.clone()));
        tracing::info!("search service started");

        Ok(Self {
            commands: command_tx,
            state: state_rx,
            events,
            cancel,
        })
    }

    /// Start a new query. Any earlier query is superseded.
    ///
    /// Returns once the state has moved to `Loading` (or straight to
    /// `Error` for an empty query or no usable sources).
    pub async fn search(&self, query: impl Into<String>, enrichment: Option<Enrichment>) -> Result<()> {
        let query = query.into();
        self.request(|reply| Command::Search {
            query,
            enrichment,
            reply,
        })
        .await
    }

    /// Run the escalation tier for the current `Partial` result.
    ///
    /// Returns `false` without doing anything in any other state.
    pub async fn load_more(&self) -> Result<bool> {
        self.request(|reply| Command::LoadMore { reply }).await
    }

    /// Return to `Idle`, discarding the effect of any in-flight phase.
    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| Command::Clear { reply }).await
    }

    /// Current state snapshot.
    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Latest-value receiver for the state.
    pub fn watch(&self) -> watch::Receiver<SearchState> {
        self.state.clone()
    }

    /// Receiver for every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SearchState> {
        self.events.subscribe()
    }

    /// The current state followed by every later transition.
    ///
    /// An observer that falls more than `state_buffer` states behind skips
    /// the ones it missed; the next state it sees is always current. The
    /// stream ends once the service is stopped.
    pub fn observe_state(&self) -> impl Stream<Item = SearchState> + Send + 'static {
        let mut rx = self.events.subscribe();
        let current = self.state();
        let cancel = self.cancel.clone();
        async_stream::stream! {
            yield current;
            loop {
                let received = tokio::select! {
                    biased;
                    received = rx.recv() => received,
                    _ = cancel.cancelled() => break,
                };
                match received {
                    Ok(state) => yield state,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "state observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Wait until the state is one a caller can act on: `Partial`,
    /// `Complete`, `Error` or `Idle`.
    pub async fn settled(&self) -> Result<SearchState> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| {
                s.status.is_terminal()
                    || matches!(s.status, SearchStatus::Partial | SearchStatus::Idle)
            })
            .await
            .map_err(|_| SearchError::Stopped)?;
        Ok(state.clone())
    }

    /// Stop the actor. In-flight phase work is aborted.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Stopped);
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SearchError::Stopped)?;
        response
            .await
            .map_err(|_| SearchError::Channel("search actor dropped the reply".into()))
    }
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("status", &self.state.borrow().status)
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

struct Actor {
    deps: Collaborators,
    config: EngineConfig,
    generation: u64,
    state: SearchState,
    /// Deduplicated fast-phase results an escalation builds on.
    base: Vec<ResultItem>,
    /// Tasks waiting for `load_more`.
    escalatable: Vec<Task>,
    phase: Option<JoinHandle<()>>,
    phase_tx: mpsc::UnboundedSender<PhaseMessage>,
    state_tx: watch::Sender<SearchState>,
    events: broadcast::Sender<SearchState>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut phases: mpsc::UnboundedReceiver<PhaseMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(message) = phases.recv() => self.handle_phase(message),
            }
        }
        self.abort_phase();
        tracing::info!("search service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Search {
                query,
                enrichment,
                reply,
            } => {
                self.start_search(query, enrichment);
                let _ = reply.send(());
            }
            Command::LoadMore { reply } => {
                let started = self.load_more();
                let _ = reply.send(started);
            }
            Command::Clear { reply } => {
                self.reset();
                self.publish(SearchState::idle());
                let _ = reply.send(());
            }
        }
    }

    /// Invalidate everything belonging to the previous query.
    fn reset(&mut self) {
        self.generation += 1;
        self.abort_phase();
        self.base.clear();
        self.escalatable.clear();
    }

    fn abort_phase(&mut self) {
        if let Some(handle) = self.phase.take() {
            handle.abort();
        }
    }

    fn start_search(&mut self, query: String, enrichment: Option<Enrichment>) {
        self.reset();
        let query = query.trim().to_owned();
        self.publish(SearchState::loading(&query));

        if query.is_empty() {
            let err = SearchError::Setup("query must not be empty".into());
            self.publish(SearchState::error(&query, err.to_string()));
            return;
        }

        let sources = self.deps.registry.enabled_searchable_sources();
        let tasks = build_tasks(&sources, &query, enrichment.as_ref());
        if tasks.is_empty() {
            let err = SearchError::Setup("no sources are enabled for search".into());
            tracing::warn!(generation = self.generation, "{err}");
            self.publish(SearchState::error(&query, err.to_string()));
            return;
        }

        tracing::trace!(query = %query, generation = self.generation, "query");
        tracing::info!(
            generation = self.generation,
            sources = sources.len(),
            tasks = tasks.len(),
            "starting fast phase"
        );

        let generation = self.generation;
        let deps = self.deps.clone();
        let config = self.config.clone();
        let tx = self.phase_tx.clone();
        self.phase = Some(tokio::spawn(async move {
            let outcome = run_fast(tasks, &deps, &config).await;
            let _ = tx.send(PhaseMessage {
                generation,
                event: PhaseEvent::FastDone(outcome),
            });
        }));
    }

    fn load_more(&mut self) -> bool {
        if self.state.status != SearchStatus::Partial {
            tracing::debug!(status = %self.state.status, "load_more ignored");
            return false;
        }
        self.start_escalation();
        true
    }

    fn start_escalation(&mut self) {
        let tasks = std::mem::take(&mut self.escalatable);
        let base = std::mem::take(&mut self.base);
        let query = self.state.query.clone();

        tracing::info!(generation = self.generation, tasks = tasks.len(), "starting escalation");
        self.publish(SearchState::loading_more(&query, base.clone(), tasks.len()));

        let generation = self.generation;
        let tx = self.phase_tx.clone();
        let progress = run_escalated(query, tasks, base, self.deps.clone(), &self.config);
        self.phase = Some(tokio::spawn(async move {
            let mut progress = pin!(progress);
            while let Some(state) = progress.next().await {
                let message = PhaseMessage {
                    generation,
                    event: PhaseEvent::Escalation(state),
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        }));
    }

    fn handle_phase(&mut self, message: PhaseMessage) {
        if message.generation != self.generation {
            tracing::debug!(
                stale = message.generation,
                current = self.generation,
                "discarding result of superseded phase"
            );
            return;
        }

        match message.event {
            PhaseEvent::FastDone(outcome) if self.state.status == SearchStatus::Loading => {
                self.phase = None;
                self.finish_fast(outcome);
            }
            PhaseEvent::Escalation(state) if self.state.status == SearchStatus::LoadingMore => {
                if state.status == SearchStatus::Complete {
                    self.phase = None;
                }
                self.publish(state);
            }
            _ => {
                tracing::debug!(status = %self.state.status, "phase message ignored in current state");
            }
        }
    }

    fn finish_fast(&mut self, outcome: FastOutcome) {
        let query = self.state.query.clone();
        let results = merge(&outcome.results, &[]);

        if outcome.escalatable.is_empty() {
            tracing::info!(results = results.len(), "search complete");
            self.publish(SearchState::complete(&query, results));
            return;
        }

        self.base = results;
        self.escalatable = outcome.escalatable;

        if self.base.is_empty() {
            // Nothing to show yet but a retry is possible: escalate without
            // waiting for load_more.
            tracing::info!("fast phase empty; escalating automatically");
            self.start_escalation();
            return;
        }

        let pending: HashSet<&str> = self
            .escalatable
            .iter()
            .map(|task| task.source.id.as_str())
            .collect();
        let state = SearchState::partial(&query, self.base.clone(), pending.len());
        tracing::info!(
            results = state.results.len(),
            pending_sources = state.pending_count,
            "fast phase partial"
        );
        self.publish(state);
    }

    fn publish(&mut self, state: SearchState) {
        tracing::debug!(status = %state.status, results = state.results.len(), "state transition");
        self.state = state.clone();
        self.state_tx.send_replace(state.clone());
        // No subscribers is fine.
        let _ = self.events.send(state);
    }
}
