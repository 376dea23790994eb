//! Strategy board for the growth cycle.
//!
//! The scheduler's decisions as pure transitions over [`EngineState`]. The
//! effectful growth cycle calls these; nothing here does I/O. At most one
//! strategy is `Active` at any time, and every transition preserves that.

use crate::config::SchedulerConfig;
use crate::core::state::{EngineState, EventType, TraceEvent};
use crate::core::strategy::{
    next_strategy_id, query_key, StrategyNode, StrategyOrigin, StrategyPlan, StrategyStatus,
};
use crate::error::{ProspectorError, Result};

/// Which strategy a cycle will work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A strategy was already active (possibly with an unfinished batch).
    Resumed(String),
    /// The oldest pending strategy was just promoted.
    Promoted(String),
    /// Nothing pending; the planner must be asked.
    Empty,
}

/// Strategy queue state machine.
///
/// All strategy and failure-counter mutations go through this struct.
#[derive(Debug)]
pub struct StrategyBoard<'a> {
    state: &'a mut EngineState,
    config: &'a SchedulerConfig,
}

impl<'a> StrategyBoard<'a> {
    pub fn new(state: &'a mut EngineState, config: &'a SchedulerConfig) -> Self {
        Self { state, config }
    }

    /// Reuse the active strategy, else promote the oldest pending one.
    pub fn select(&mut self) -> Selection {
        if let Some(active) = self.state.active_strategy() {
            return Selection::Resumed(active.id.clone());
        }

        let oldest = self
            .state
            .strategies
            .iter_mut()
            .filter(|s| s.status == StrategyStatus::Pending)
            .min_by_key(|s| s.created_at);

        match oldest {
            Some(strategy) => {
                strategy.status = StrategyStatus::Active;
                strategy.touch();
                let id = strategy.id.clone();
                self.trace(EventType::StrategyActivated, id.clone());
                Selection::Promoted(id)
            }
            None => Selection::Empty,
        }
    }

    /// Append planner output as pending strategies.
    ///
    /// Plans with an empty sector or query, or whose query is already
    /// pending or active, are skipped. Returns the IDs added.
    pub fn add_plans(&mut self, plans: Vec<StrategyPlan>, origin: StrategyOrigin) -> Vec<String> {
        let mut added = Vec::new();
        for plan in plans {
            if plan.sector.trim().is_empty() || plan.query.trim().is_empty() {
                continue;
            }
            if self.is_queued(&plan.query) {
                continue;
            }
            let node = self.new_node(plan, origin);
            added.push(node.id.clone());
            self.state.strategies.push(node);
        }

        if !added.is_empty() {
            self.trace(EventType::StrategiesPlanned, added.join(","));
        }
        added
    }

    /// Enqueue an operator-supplied strategy.
    pub fn enqueue_manual(&mut self, plan: StrategyPlan) -> Result<String> {
        if plan.sector.trim().is_empty() || plan.query.trim().is_empty() {
            return Err(ProspectorError::invalid_state(
                "strategy needs a non-empty sector and query",
            ));
        }
        if self.is_queued(&plan.query) {
            return Err(ProspectorError::invalid_state(format!(
                "query '{}' is already pending or active",
                plan.query.trim()
            )));
        }

        let node = self.new_node(plan, StrategyOrigin::Manual);
        let id = node.id.clone();
        self.state.strategies.push(node);
        self.trace(EventType::StrategyEnqueued, id.clone());
        Ok(id)
    }

    /// Transition: Active → Completed
    pub fn complete(&mut self, id: &str) -> Result<()> {
        self.finish(id, StrategyStatus::Completed)?;
        self.trace(EventType::StrategyCompleted, id.to_string());
        Ok(())
    }

    /// Transition: Active → Failed
    pub fn fail(&mut self, id: &str) -> Result<()> {
        self.finish(id, StrategyStatus::Failed)?;
        self.trace(EventType::StrategyFailed, id.to_string());
        Ok(())
    }

    /// Credit leads created while `id` was active.
    pub fn record_leads(&mut self, id: &str, count: u32) {
        if let Some(strategy) = self.state.strategy_mut(id) {
            strategy.leads_created += count;
            strategy.touch();
        }
    }

    pub fn record_success(&mut self) {
        self.state.consecutive_failures = 0;
    }

    /// Count a non-rate-limit failure. Returns the new count.
    pub fn record_failure(&mut self, details: impl Into<String>) -> u32 {
        self.state.consecutive_failures += 1;
        self.trace(EventType::FailureRecorded, details.into());
        self.state.consecutive_failures
    }

    pub fn should_trip(&self) -> bool {
        self.state.consecutive_failures >= self.config.max_consecutive_failures
    }

    /// Disable cycles and reset the counter. Returns the count that tripped.
    pub fn trip(&mut self) -> u32 {
        let failures = self.state.consecutive_failures;
        self.state.consecutive_failures = 0;
        self.trace(
            EventType::Tripped,
            format!("{} consecutive failures", failures),
        );
        self.state
            .disable("circuit breaker tripped", self.config.trace_limit);
        failures
    }

    fn finish(&mut self, id: &str, to: StrategyStatus) -> Result<()> {
        let strategy = self
            .state
            .strategy_mut(id)
            .ok_or_else(|| ProspectorError::invalid_state(format!("unknown strategy {}", id)))?;
        if strategy.status != StrategyStatus::Active {
            return Err(ProspectorError::invalid_state(format!(
                "cannot mark strategy {} {} from {}",
                id,
                to.as_str(),
                strategy.status.as_str()
            )));
        }
        strategy.status = to;
        strategy.touch();
        Ok(())
    }

    /// IDs continue after every strategy already on the board, including
    /// ones written by earlier processes.
    fn new_node(&self, plan: StrategyPlan, origin: StrategyOrigin) -> StrategyNode {
        let id = next_strategy_id(self.state.strategies.iter().map(|s| s.id.as_str()));
        StrategyNode::with_id(id, plan, origin)
    }

    fn is_queued(&self, query: &str) -> bool {
        let key = query_key(query);
        self.state.strategies.iter().any(|s| {
            matches!(s.status, StrategyStatus::Pending | StrategyStatus::Active)
                && s.query_key() == key
        })
    }

    fn trace(&mut self, event_type: EventType, details: String) {
        self.state.add_trace(
            TraceEvent::with_details(event_type, details),
            self.config.trace_limit,
        );
    }
}
