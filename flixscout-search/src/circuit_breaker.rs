//! Per-source circuit breaker used for health tracking and demotion.
//!
//! Tracks consecutive failures per source. A source that fails
//! repeatedly trips to Open and is demoted behind healthy sources in the
//! registry ordering. After a cooldown the next registry lookup moves it
//! to HalfOpen, where its next outcome decides whether it recovers.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use crate::backend::HealthTracker;
use crate::types::Source;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Circuit breaker state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Source is healthy.
    Closed,
    /// Source failed too often and is demoted until the cooldown expires.
    Open,
    /// Cooldown has elapsed; the next outcome decides.
    HalfOpen,
}

/// Health tracking data for a single source.
#[derive(Debug, Clone)]
pub struct SourceHealthEntry {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

impl Default for SourceHealthEntry {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Seconds to wait in Open state before transitioning to HalfOpen.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 300,
        }
    }
}

/// One row of [`CircuitBreaker::health_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReportEntry {
    pub source_id: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Per-source circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    sources: HashMap<String, SourceHealthEntry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            sources: HashMap::new(),
        }
    }

    /// Reset the failure count and close the circuit regardless of the
    /// previous state.
    pub fn record_success(&mut self, source_id: &str) {
        let health = self.sources.entry(source_id.to_owned()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
        health.last_success_at = Some(Instant::now());
    }

    /// Count a failure, tripping the circuit at the configured threshold.
    /// A failure while HalfOpen re-trips immediately.
    pub fn record_failure(&mut self, source_id: &str) {
        let health = self.sources.entry(source_id.to_owned()).or_default();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure_at = Some(Instant::now());

        if health.state == CircuitState::HalfOpen
            || health.consecutive_failures >= self.config.failure_threshold
        {
            health.state = CircuitState::Open;
        }
    }

    /// Whether the source should be treated as healthy right now.
    ///
    /// - Closed / HalfOpen: `true`
    /// - Open: `true` only once the cooldown has elapsed, which moves the
    ///   source to HalfOpen
    pub fn should_attempt(&mut self, source_id: &str) -> bool {
        let Some(health) = self.sources.get_mut(source_id) else {
            return true;
        };

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= self.config.cooldown_secs);

                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn source_status(&self, source_id: &str) -> CircuitState {
        self.sources
            .get(source_id)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// Health of every source seen so far, sorted by id.
    pub fn health_report(&self) -> Vec<HealthReportEntry> {
        let mut report: Vec<HealthReportEntry> = self
            .sources
            .iter()
            .map(|(id, health)| HealthReportEntry {
                source_id: id.clone(),
                state: health.state,
                consecutive_failures: health.consecutive_failures,
            })
            .collect();
        report.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        report
    }

    pub fn reset(&mut self) {
        self.sources.clear();
    }
}

/// Thread-safe health tracker shared by the runners and the registry.
///
/// Owned by whoever builds the collaborators; there is no process-wide
/// instance.
#[derive(Debug)]
pub struct SourceHealth {
    breaker: Mutex<CircuitBreaker>,
}

impl SourceHealth {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("source health lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Whether the source should currently be ranked behind healthy ones.
    pub fn is_demoted(&self, source_id: &str) -> bool {
        !self.lock().should_attempt(source_id)
    }

    pub fn status(&self, source_id: &str) -> CircuitState {
        self.lock().source_status(source_id)
    }

    pub fn health_report(&self) -> Vec<HealthReportEntry> {
        self.lock().health_report()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl HealthTracker for SourceHealth {
    fn record_success(&self, source: &Source) {
        self.lock().record_success(&source.id);
    }

    fn record_failure(&self, source: &Source) {
        let mut breaker = self.lock();
        breaker.record_failure(&source.id);
        if breaker.source_status(&source.id) == CircuitState::Open {
            tracing::debug!(source = %source.id, "source demoted after repeated failures");
        }
    }
}
