//! Iterative research for admitted leads.
//!
//! - `analysis`: the analyzer's structured output
//! - `corpus`: accumulated pages and search signals
//! - `attempt`: per-pass trace, best-result selection, outcomes
//! - `engine`: the bounded multi-pass research loop

pub mod analysis;
pub mod attempt;
pub mod corpus;
pub mod engine;

pub use analysis::Analysis;
pub use attempt::{select_best, BestResult, ResearchAttempt, ResearchOutcome, ResearchStatus};
pub use corpus::{ResearchCorpus, SourcedPage, PRIMARY_PAGE};
pub use engine::{alternate_url, site_url, ResearchEngine, ResearchTarget};
