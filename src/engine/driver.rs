//! Driven loop over [`GrowthCycle`].
//!
//! Calls `run_cycle`, sleeps the delay the cycle asked for, and repeats
//! until the cycle stops rescheduling, a cycle bound is hit, or the
//! [`DriverHandle`] requests a stop. Cycles never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::EngineSnapshot;
use crate::engine::cycle::{CycleOutcome, GrowthCycle};

/// Why the driver returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The handle requested a stop.
    Stopped,
    /// The configured cycle bound was reached.
    MaxCycles,
    /// The last cycle did not reschedule (disabled, tripped, interrupted).
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub cycles: u64,
    pub last_outcome: Option<CycleOutcome>,
    pub reason: StopReason,
    pub state: EngineSnapshot,
}

/// Cancels a running [`CycleDriver`].
#[derive(Clone)]
pub struct DriverHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    interrupt: Arc<AtomicBool>,
}

impl DriverHandle {
    /// Stop after the in-flight step. Wakes a sleeping driver immediately
    /// and interrupts an enrichment batch at its next step boundary.
    pub fn stop(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

pub struct CycleDriver {
    cycle: GrowthCycle,
    max_cycles: Option<u64>,
    // Held so `changed()` never errors while the driver runs.
    _stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl CycleDriver {
    pub fn new(cycle: GrowthCycle, max_cycles: Option<u64>) -> (Self, DriverHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let handle = DriverHandle {
            stop_tx: Arc::clone(&stop_tx),
            interrupt: cycle.interrupt_handle(),
        };
        let driver = Self {
            cycle,
            max_cycles,
            _stop_tx: stop_tx,
            stop_rx,
        };
        (driver, handle)
    }

    pub async fn run(mut self) -> DriverSummary {
        let mut cycles = 0u64;
        let mut last_outcome = None;

        let reason = loop {
            if *self.stop_rx.borrow() {
                break StopReason::Stopped;
            }

            let report = self.cycle.run_cycle().await;
            cycles += 1;
            debug!(
                cycle = cycles,
                outcome = %report.outcome,
                next_delay_secs = report.next_delay.map(|d| d.as_secs()),
                "driver tick"
            );
            let next_delay = report.next_delay;
            last_outcome = Some(report.outcome);

            if *self.stop_rx.borrow() {
                break StopReason::Stopped;
            }
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break StopReason::MaxCycles;
            }
            let Some(delay) = next_delay else {
                break StopReason::Halted;
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop_rx.changed() => {
                    if *self.stop_rx.borrow() {
                        break StopReason::Stopped;
                    }
                }
            }
        };

        info!(cycles, reason = ?reason, "driver finished");
        DriverSummary {
            cycles,
            last_outcome,
            reason,
            state: self.cycle.get_state(),
        }
    }
}
