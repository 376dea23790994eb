//! Run command for Prospector.
//!
//! Drives growth cycles against replayed collaborators until the engine
//! stops rescheduling, the cycle bound is hit, or Ctrl-C is pressed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{project_dir, Config};
use crate::core::EngineSnapshot;
use crate::engine::{
    Collaborators, CycleDriver, CycleOutcome, DriverHandle, DriverSummary, GrowthCycle,
    StopReason,
};
use crate::error::{ProspectorError, Result};
use crate::providers::ReplayProviders;
use crate::storage::ProspectStore;

const DEFAULT_FIXTURE: &str = "replay.json";

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Replay fixture. Defaults to `.prospector/replay.json`.
    pub fixture: Option<PathBuf>,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
}

/// Output format for the run command.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Whether the driver ran. A trip still counts as a successful run.
    pub success: bool,
    pub cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<CycleOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<EngineSnapshot>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutput {
    pub fn from_summary(summary: DriverSummary) -> Self {
        Self {
            success: true,
            cycles: summary.cycles,
            reason: Some(summary.reason),
            last_outcome: summary.last_outcome,
            state: Some(summary.state),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            cycles: 0,
            reason: None,
            last_outcome: None,
            state: None,
            error: Some(error.into()),
        }
    }

    /// The last cycle tripped the consecutive-failure breaker.
    pub fn tripped(&self) -> bool {
        matches!(self.last_outcome, Some(CycleOutcome::Tripped { .. }))
    }
}

/// The run command implementation.
pub struct RunCommand {
    config: Config,
    store: Arc<dyn ProspectStore>,
    cwd: PathBuf,
}

impl RunCommand {
    pub fn new(config: Config, store: Arc<dyn ProspectStore>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            store,
            cwd: cwd.into(),
        }
    }

    /// Run cycles until the driver stops. Ctrl-C requests a stop.
    pub async fn run(&self, options: &RunOptions) -> RunOutput {
        let (driver, handle) = match self.prepare(options) {
            Ok(prepared) => prepared,
            Err(e) => return RunOutput::failure(e.to_string()),
        };

        let signal = tokio::spawn(stop_on_ctrl_c(handle));
        let summary = driver.run().await;
        signal.abort();

        RunOutput::from_summary(summary)
    }

    /// Load the fixture and wire a driver over it.
    pub fn prepare(&self, options: &RunOptions) -> Result<(CycleDriver, DriverHandle)> {
        let fixture = self.fixture_path(options);
        if !fixture.exists() {
            return Err(ProspectorError::config(format!(
                "no replay fixture at {} (pass --fixture)",
                fixture.display()
            )));
        }

        let providers = Arc::new(ReplayProviders::load(&fixture)?);
        info!(fixture = %fixture.display(), "replaying collaborators");

        let cycle = GrowthCycle::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Collaborators::uniform(providers),
        )?;
        Ok(CycleDriver::new(cycle, options.max_cycles))
    }

    fn fixture_path(&self, options: &RunOptions) -> PathBuf {
        match &options.fixture {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.cwd.join(path),
            None => project_dir(&self.cwd).join(DEFAULT_FIXTURE),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &RunOutput, options: &RunOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &RunOutput) -> String {
        if !output.success {
            return format!(
                "Run failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        let reason = match output.reason {
            Some(StopReason::Stopped) => "stopped",
            Some(StopReason::MaxCycles) => "cycle limit reached",
            Some(StopReason::Halted) | None => "halted",
        };
        lines.push(format!("Ran {} cycles ({})", output.cycles, reason));
        if let Some(outcome) = &output.last_outcome {
            lines.push(format!("Last cycle: {}", outcome));
        }
        if let Some(state) = &output.state {
            if !state.enabled {
                lines.push(
                    "Growth cycle is DISABLED; run `prospector enable` to resume.".to_string(),
                );
            }
        }
        lines.join("\n") + "\n"
    }
}

async fn stop_on_ctrl_c(handle: DriverHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, stopping after the current step");
            handle.stop();
        }
        Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
    }
}

/// Write `fixture` JSON next to the project config. Used by `init --demo`.
pub fn write_fixture(cwd: &Path, content: &str) -> Result<PathBuf> {
    let dir = project_dir(cwd);
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::storage(&dir, e))?;
    let path = dir.join(DEFAULT_FIXTURE);
    crate::util::write_atomic(&path, content.as_bytes())?;
    Ok(path)
}
