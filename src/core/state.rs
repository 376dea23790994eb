//! Engine state types for Prospector.
//!
//! `EngineState` is everything the growth cycle carries between runs: the
//! strategy queue, the failure counter, the cooldown window, persisted
//! breaker states, and a bounded decision trace.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::strategy::{StrategyNode, StrategyStatus};
use crate::resilience::{CircuitBreakerState, CooldownWindow};

/// Persistent state of the growth cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineState {
    /// Whether cycles may run. Cleared by a trip or by the operator.
    pub enabled: bool,
    /// All strategies ever scheduled, in creation order.
    pub strategies: Vec<StrategyNode>,
    /// Non-rate-limit failures since the last successful cycle.
    pub consecutive_failures: u32,
    /// Global rate-limit pause.
    #[serde(default)]
    pub cooldown: CooldownWindow,
    /// Circuit breaker states by key.
    #[serde(default)]
    pub breakers: BTreeMap<String, CircuitBreakerState>,
    /// Bounded decision trail, oldest first.
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
    /// Cycles that passed the guard.
    #[serde(default)]
    pub cycles_run: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            enabled: true,
            strategies: Vec::new(),
            consecutive_failures: 0,
            cooldown: CooldownWindow::default(),
            breakers: BTreeMap::new(),
            trace: Vec::new(),
            cycles_run: 0,
            updated_at: Utc::now(),
        }
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_strategy(&self) -> Option<&StrategyNode> {
        self.strategies
            .iter()
            .find(|s| s.status == StrategyStatus::Active)
    }

    pub fn strategy(&self, id: &str) -> Option<&StrategyNode> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn strategy_mut(&mut self, id: &str) -> Option<&mut StrategyNode> {
        self.strategies.iter_mut().find(|s| s.id == id)
    }

    pub fn count_with_status(&self, status: StrategyStatus) -> usize {
        self.strategies.iter().filter(|s| s.status == status).count()
    }

    /// `"{sector}: {query}"` for every known strategy, handed to the planner.
    pub fn history(&self) -> Vec<String> {
        self.strategies.iter().map(StrategyNode::history_line).collect()
    }

    /// Re-enable cycles and clear the failure counter.
    pub fn enable(&mut self, trace_limit: usize) {
        self.enabled = true;
        self.consecutive_failures = 0;
        self.add_trace(TraceEvent::new(EventType::Enabled, None), trace_limit);
    }

    pub fn disable(&mut self, reason: &str, trace_limit: usize) {
        self.enabled = false;
        self.add_trace(
            TraceEvent::new(EventType::Disabled, Some(reason.to_string())),
            trace_limit,
        );
    }

    /// Append a trace event, dropping the oldest beyond `limit`.
    pub fn add_trace(&mut self, event: TraceEvent, limit: usize) {
        self.trace.push(event);
        if self.trace.len() > limit {
            let excess = self.trace.len() - limit;
            self.trace.drain(..excess);
        }
        self.touch();
    }

    /// The most recent `n` trace events, oldest first.
    pub fn recent_trace(&self, n: usize) -> &[TraceEvent] {
        let start = self.trace.len().saturating_sub(n);
        &self.trace[start..]
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            enabled: self.enabled,
            strategies: self.strategies.clone(),
            cooldown_remaining_secs: self.cooldown.remaining_secs(now),
            cooldown_max_secs: self.cooldown.max_secs,
            breaker_status: self.breakers.clone(),
            consecutive_failures: self.consecutive_failures,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Read-only view of the engine for callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineSnapshot {
    pub enabled: bool,
    pub strategies: Vec<StrategyNode>,
    pub cooldown_remaining_secs: u64,
    pub cooldown_max_secs: u64,
    pub breaker_status: BTreeMap<String, CircuitBreakerState>,
    pub consecutive_failures: u32,
}

/// Individual trace event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

impl TraceEvent {
    pub fn new(event_type: EventType, details: Option<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            details,
        }
    }

    pub fn with_details(event_type: EventType, details: impl Into<String>) -> Self {
        Self::new(event_type, Some(details.into()))
    }
}

/// Event type enum for trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A cycle passed the guard.
    CycleStarted,
    /// New strategies appended by the planner.
    StrategiesPlanned,
    /// Operator enqueued a strategy.
    StrategyEnqueued,
    /// A pending strategy became active.
    StrategyActivated,
    StrategyCompleted,
    StrategyFailed,
    /// Sourcing returned candidates.
    CandidatesSourced,
    /// Every sourced candidate was already known.
    CandidatesRejected,
    LeadCreated,
    LeadResearched,
    /// An enrichment batch stopped early.
    BatchAborted,
    /// A rate-limit signal engaged the cooldown.
    CooldownEngaged,
    /// A circuit breaker refused a call.
    CircuitOpen,
    /// A non-rate-limit failure was counted.
    FailureRecorded,
    /// Too many consecutive failures; cycles disabled.
    Tripped,
    Enabled,
    Disabled,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CycleStarted => "cycle_started",
            EventType::StrategiesPlanned => "strategies_planned",
            EventType::StrategyEnqueued => "strategy_enqueued",
            EventType::StrategyActivated => "strategy_activated",
            EventType::StrategyCompleted => "strategy_completed",
            EventType::StrategyFailed => "strategy_failed",
            EventType::CandidatesSourced => "candidates_sourced",
            EventType::CandidatesRejected => "candidates_rejected",
            EventType::LeadCreated => "lead_created",
            EventType::LeadResearched => "lead_researched",
            EventType::BatchAborted => "batch_aborted",
            EventType::CooldownEngaged => "cooldown_engaged",
            EventType::CircuitOpen => "circuit_open",
            EventType::FailureRecorded => "failure_recorded",
            EventType::Tripped => "tripped",
            EventType::Enabled => "enabled",
            EventType::Disabled => "disabled",
        }
    }
}
