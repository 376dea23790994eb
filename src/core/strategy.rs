//! Strategy entity types for Prospector.
//!
//! A strategy is a named targeting query (sector + search string) that the
//! growth cycle executes to source candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicU32;

use crate::core::ids::next_daily_id;

static STRATEGY_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a strategy ID (format: `strat_YYYYMMDD_NNN`).
pub fn generate_strategy_id() -> String {
    next_strategy_id(std::iter::empty::<&str>())
}

/// Generate a strategy ID that sorts after every ID in `taken`.
pub fn next_strategy_id<'a>(taken: impl IntoIterator<Item = &'a str>) -> String {
    next_daily_id("strat", 3, &STRATEGY_COUNTER, taken)
}

/// Where a strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyOrigin {
    /// Produced by the planning collaborator.
    Planned,
    /// Enqueued by an operator.
    Manual,
}

/// Lifecycle of a strategy.
///
/// Transitions are `Pending -> Active -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

impl StrategyStatus {
    /// Completed and failed strategies never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StrategyStatus::Completed | StrategyStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Pending => "pending",
            StrategyStatus::Active => "active",
            StrategyStatus::Completed => "completed",
            StrategyStatus::Failed => "failed",
        }
    }
}

/// A planned-but-unscheduled strategy, as returned by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyPlan {
    pub sector: String,
    pub query: String,
    #[serde(default)]
    pub rationale: String,
}

impl StrategyPlan {
    pub fn new(
        sector: impl Into<String>,
        query: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            sector: sector.into(),
            query: query.into(),
            rationale: rationale.into(),
        }
    }
}

/// A strategy owned by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyNode {
    /// Unique identifier (format: strat_YYYYMMDD_NNN).
    pub id: String,
    /// Target market sector.
    pub sector: String,
    /// Search string handed to the sourcing collaborator.
    pub query: String,
    /// Why this strategy was chosen.
    pub rationale: String,
    /// Current lifecycle status.
    pub status: StrategyStatus,
    /// Planner or operator.
    pub origin: StrategyOrigin,
    /// When the strategy was created; pending strategies run oldest first.
    pub created_at: DateTime<Utc>,
    /// When the strategy last changed status.
    pub updated_at: DateTime<Utc>,
    /// Leads created while this strategy was active.
    #[serde(default)]
    pub leads_created: u32,
}

impl StrategyNode {
    /// Create a pending strategy from a plan.
    pub fn from_plan(plan: StrategyPlan, origin: StrategyOrigin) -> Self {
        Self::with_id(generate_strategy_id(), plan, origin)
    }

    pub fn with_id(id: String, plan: StrategyPlan, origin: StrategyOrigin) -> Self {
        let now = Utc::now();
        Self {
            id,
            sector: plan.sector,
            query: plan.query,
            rationale: plan.rationale,
            status: StrategyStatus::Pending,
            origin,
            created_at: now,
            updated_at: now,
            leads_created: 0,
        }
    }

    /// History line handed to the planner.
    pub fn history_line(&self) -> String {
        format!("{}: {}", self.sector, self.query)
    }

    /// Normalized query used to detect repeated strategies.
    pub fn query_key(&self) -> String {
        query_key(&self.query)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Lowercase and collapse whitespace so trivially different queries compare equal.
pub fn query_key(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
