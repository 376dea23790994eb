//! The growth cycle and the loop that drives it.

pub mod cycle;
pub mod driver;

pub use cycle::{Collaborators, CycleOutcome, CycleReport, CycleStage, GrowthCycle};
pub use driver::{CycleDriver, DriverHandle, DriverSummary, StopReason};
