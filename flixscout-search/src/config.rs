//! Engine configuration with sensible defaults.
//!
//! [`EngineConfig`] controls worker pool size, phase deadlines, fetch
//! timeouts, and source health thresholds. It deserialises from any serde
//! format so host applications can embed it in their own config files.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the search orchestration engine.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent fetches allowed during the fast phase, independent of
    /// how many tasks there are.
    pub worker_pool_size: usize,
    /// Wall-clock cap on the whole fast phase, in seconds.
    pub fast_phase_deadline_secs: u64,
    /// Per-task timeout for strict-mode fetches, in seconds. Must be
    /// shorter than the fast phase deadline.
    pub strict_timeout_secs: u64,
    /// Per-task timeout for fallback-mode fetches, in seconds.
    pub fallback_timeout_secs: u64,
    /// Capacity of the state broadcast channel. Slow observers that fall
    /// further behind than this miss intermediate states.
    pub state_buffer: usize,
    /// Health tracking thresholds.
    pub health: CircuitBreakerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            fast_phase_deadline_secs: 15,
            strict_timeout_secs: 8,
            fallback_timeout_secs: 45,
            state_buffer: 64,
            health: CircuitBreakerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `worker_pool_size` must be greater than 0
    /// - all timeouts must be greater than 0
    /// - `strict_timeout_secs` must be < `fast_phase_deadline_secs`
    /// - `state_buffer` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.worker_pool_size == 0 {
            return Err(SearchError::Config(
                "worker_pool_size must be greater than 0".into(),
            ));
        }
        if self.fast_phase_deadline_secs == 0 {
            return Err(SearchError::Config(
                "fast_phase_deadline_secs must be greater than 0".into(),
            ));
        }
        if self.strict_timeout_secs == 0 {
            return Err(SearchError::Config(
                "strict_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.strict_timeout_secs >= self.fast_phase_deadline_secs {
            return Err(SearchError::Config(
                "strict_timeout_secs must be shorter than fast_phase_deadline_secs".into(),
            ));
        }
        if self.fallback_timeout_secs == 0 {
            return Err(SearchError::Config(
                "fallback_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.state_buffer == 0 {
            return Err(SearchError::Config(
                "state_buffer must be greater than 0".into(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(SearchError::Config(
                "health.failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn fast_phase_deadline(&self) -> Duration {
        Duration::from_secs(self.fast_phase_deadline_secs)
    }

    pub fn strict_timeout(&self) -> Duration {
        Duration::from_secs(self.strict_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}
