//! Per-key circuit breakers.
//!
//! [`CircuitBreakerState`] transitions are pure functions of the current
//! state, the config, the outcome, and an explicit `now`. The
//! [`BreakerRegistry`] keys them by logical dependency and wraps calls.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BreakerConfig;
use crate::error::{ProspectorError, Result};

/// Source of the current time, injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls fail fast until the timeout elapses.
    Open,
    /// Probing whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Whether a call may go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    Reject { retry_in_secs: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CircuitBreakerState {
    /// Failures since the breaker last closed (or last closed-state success).
    pub failure_count: u32,
    /// Consecutive successes while half-open.
    pub success_count: u32,
    pub state: CircuitState,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// A half-open trial call is running; further calls are rejected until it settles.
    #[serde(skip)]
    pub trial_in_flight: bool,
}

impl CircuitBreakerState {
    /// Decide whether a call may run at `now`.
    ///
    /// An open breaker whose timeout has elapsed moves to half-open and lets
    /// exactly one trial call through.
    pub fn admit(&mut self, config: &BreakerConfig, now: DateTime<Utc>) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::Open => {
                let remaining = self.open_remaining_secs(config, now);
                if remaining > 0 {
                    return Admission::Reject {
                        retry_in_secs: remaining,
                    };
                }
                self.state = CircuitState::HalfOpen;
                self.success_count = 0;
                self.trial_in_flight = true;
                Admission::Proceed
            }
            CircuitState::HalfOpen if self.trial_in_flight => {
                Admission::Reject { retry_in_secs: 0 }
            }
            CircuitState::HalfOpen => {
                self.trial_in_flight = true;
                Admission::Proceed
            }
        }
    }

    pub fn record_success(&mut self, config: &BreakerConfig) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.trial_in_flight = false;
                self.success_count += 1;
                if self.success_count >= config.success_threshold {
                    self.close();
                }
            }
            // A call admitted before the breaker opened; it proves nothing.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self, config: &BreakerConfig, now: DateTime<Utc>) {
        self.failure_count += 1;
        self.last_failure_time = Some(now);
        self.trial_in_flight = false;
        self.success_count = 0;
        if self.failure_count >= config.failure_threshold {
            self.state = CircuitState::Open;
        }
    }

    /// Seconds until an open breaker admits a trial call, 0 otherwise.
    pub fn open_remaining_secs(&self, config: &BreakerConfig, now: DateTime<Utc>) -> u64 {
        if self.state != CircuitState::Open {
            return 0;
        }
        let Some(last_failure) = self.last_failure_time else {
            return 0;
        };
        let elapsed = now.signed_duration_since(last_failure).num_seconds().max(0);
        config.timeout_secs.saturating_sub(elapsed.unsigned_abs())
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.trial_in_flight = false;
    }
}

/// Breakers keyed by logical dependency (`sourcing`, `planning`, `enrichment`).
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, CircuitBreakerState>>,
    clock: Clock,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    pub fn with_clock(config: BreakerConfig, clock: Clock) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Restore previously persisted breaker states.
    pub fn restore(&self, states: BTreeMap<String, CircuitBreakerState>) {
        self.lock().extend(states);
    }

    /// Run `call` behind the breaker for `key`.
    ///
    /// Fails fast with [`ProspectorError::CircuitOpen`] without invoking
    /// `call` when the breaker refuses it.
    pub async fn execute<T, F, Fut>(&self, key: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = {
            let now = (self.clock)();
            let mut breakers = self.lock();
            breakers
                .entry(key.to_string())
                .or_default()
                .admit(&self.config, now)
        };
        if let Admission::Reject { retry_in_secs } = admission {
            warn!(key, retry_in_secs, "circuit open, call rejected");
            return Err(ProspectorError::circuit_open(key, retry_in_secs));
        }

        let result = call().await;

        let now = (self.clock)();
        let mut breakers = self.lock();
        let breaker = breakers.entry(key.to_string()).or_default();
        let before = breaker.state;
        match &result {
            Ok(_) => breaker.record_success(&self.config),
            Err(_) => breaker.record_failure(&self.config, now),
        }
        if breaker.state != before {
            info!(
                key,
                from = before.as_str(),
                to = breaker.state.as_str(),
                failure_count = breaker.failure_count,
                "circuit state changed"
            );
        }
        result
    }

    pub fn state_of(&self, key: &str) -> CircuitState {
        self.lock()
            .get(key)
            .map(|b| b.state)
            .unwrap_or_default()
    }

    /// Snapshot of every known breaker, ordered by key.
    pub fn status(&self) -> BTreeMap<String, CircuitBreakerState> {
        self.lock()
            .iter()
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect()
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitBreakerState>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
