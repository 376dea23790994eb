//! Collaborator interfaces and the dispatch layer in front of them.
//!
//! - `traits`: async collaborator contracts (sourcing, planning, scraping,
//!   search, analysis)
//! - `hybrid`: retry-then-failover dispatcher and provider wrappers
//! - `replay`: fixture-backed collaborators for offline runs

pub mod hybrid;
pub mod replay;
pub mod traits;

pub use hybrid::{Hybrid, HybridDispatcher, RetryPolicy};
pub use replay::{ReplayFixture, ReplayProviders};
pub use traits::{
    Analyzer, CandidateSource, ScrapeResult, SearchHit, SignalSearch, SiteScraper,
    SourcingResult, StrategyPlanner,
};
