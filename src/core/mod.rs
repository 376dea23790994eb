//! Core types and logic for Prospector.
//!
//! This module contains the strategy and lead entities, the admission
//! filter, the persistent engine state, and the strategy board that
//! drives the scheduler's pure transitions.

pub mod admission;
pub(crate) mod ids;
pub mod lead;
pub mod scheduler;
pub mod state;
pub mod strategy;

pub use admission::{admit, normalize_website, AdmissionReport, RejectedCandidate, RejectionReason};
pub use lead::{generate_lead_id, next_lead_id, Candidate, Lead, LeadStatus};
pub use scheduler::{Selection, StrategyBoard};
pub use state::{EngineSnapshot, EngineState, EventType, TraceEvent};
pub use strategy::{
    generate_strategy_id, next_strategy_id, query_key, StrategyNode, StrategyOrigin, StrategyPlan,
    StrategyStatus,
};
