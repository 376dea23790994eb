//! CLI commands for Prospector.
//!
//! Each command follows the same shape: an `XOptions` struct, a
//! serializable `XOutput` with `success`/`error`, `XCommand::run`, and
//! `format_output` for quiet, JSON, or human-readable output.
//!
//! - **Engine**: run, enable, disable
//! - **Inspection**: status, strategy, leads
//! - **Setup**: init

// Engine commands
pub mod control;
pub mod run;

// Inspection commands
pub mod leads;
pub mod status;
pub mod strategy;

// Setup commands
pub mod init;

pub use control::ControlCommand;
pub use init::InitCommand;
pub use leads::LeadsCommand;
pub use run::RunCommand;
pub use status::StatusCommand;
pub use strategy::StrategyCommand;
