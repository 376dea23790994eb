//! Prospector - autonomous prospecting orchestrator
//!
//! Prospector runs a self-scheduling growth cycle: it plans sourcing
//! strategies, discovers candidate companies, filters out ones it already
//! knows, and researches each new lead until the analysis is good enough
//! or the attempt budget runs out. Rate limits pause the whole engine,
//! circuit breakers shield flaky collaborators, and repeated failures
//! disable cycles until an operator re-enables them.

pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod providers;
pub mod research;
pub mod resilience;
pub mod storage;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use core::{
    admit, Candidate, EngineSnapshot, EngineState, Lead, LeadStatus, StrategyBoard, StrategyNode,
    StrategyPlan, StrategyStatus,
};
pub use engine::{Collaborators, CycleDriver, CycleOutcome, DriverHandle, GrowthCycle};
pub use error::{ProspectorError, Result};
pub use providers::{
    Analyzer, CandidateSource, HybridDispatcher, ReplayProviders, SignalSearch, SiteScraper,
    StrategyPlanner,
};
pub use research::{Analysis, ResearchEngine, ResearchOutcome};
pub use resilience::{BreakerRegistry, CooldownWindow};
pub use storage::{FileProspectStore, MemoryProspectStore, ProspectStore};

// CLI commands
pub use cli::{
    ControlCommand, InitCommand, LeadsCommand, RunCommand, StatusCommand, StrategyCommand,
};
