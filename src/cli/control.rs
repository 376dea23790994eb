//! Enable and disable commands for Prospector.
//!
//! Flip the persisted enablement flag. Enabling also clears the consecutive
//! failure counter, which is how an operator recovers from a trip.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::storage::ProspectStore;

/// Options for the enable/disable commands.
#[derive(Debug, Clone, Default)]
pub struct ControlOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the enable/disable commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Enablement after the command.
    pub enabled: bool,
    /// Whether the flag actually changed.
    pub changed: bool,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlOutput {
    pub fn success(enabled: bool, changed: bool) -> Self {
        Self {
            success: true,
            enabled,
            changed,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            enabled: false,
            changed: false,
            error: Some(error.into()),
        }
    }
}

/// The enable/disable command implementation.
pub struct ControlCommand<S: ProspectStore> {
    store: S,
    config: SchedulerConfig,
}

impl<S: ProspectStore> ControlCommand<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Set enablement. Returns the resulting state.
    pub fn run(&self, enable: bool, _options: &ControlOptions) -> ControlOutput {
        match self.set_enabled(enable) {
            Ok(changed) => ControlOutput::success(enable, changed),
            Err(e) => ControlOutput::failure(e.to_string()),
        }
    }

    fn set_enabled(&self, enable: bool) -> Result<bool> {
        let mut state = self.store.load_engine()?.unwrap_or_default();
        let changed = state.enabled != enable;

        if enable {
            state.enable(self.config.trace_limit);
        } else {
            state.disable("disabled by operator", self.config.trace_limit);
        }
        self.store.save_engine(&state)?;

        Ok(changed)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ControlOutput, options: &ControlOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let word = if output.enabled { "enabled" } else { "disabled" };
        if output.changed {
            format!("Growth cycle {}.\n", word)
        } else {
            format!("Growth cycle already {}.\n", word)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineState, EventType};
    use crate::storage::MemoryProspectStore;
    use std::sync::Arc;

    fn command() -> (ControlCommand<Arc<MemoryProspectStore>>, Arc<MemoryProspectStore>) {
        let store = Arc::new(MemoryProspectStore::new());
        (
            ControlCommand::new(Arc::clone(&store), SchedulerConfig::default()),
            store,
        )
    }

    #[test]
    fn test_disable_then_enable() {
        let (cmd, store) = command();
        let options = ControlOptions::default();

        let disabled = cmd.run(false, &options);
        assert!(disabled.success);
        assert!(disabled.changed);
        assert!(!store.load_engine().unwrap().unwrap().enabled);

        let enabled = cmd.run(true, &options);
        assert!(enabled.changed);
        let state = store.load_engine().unwrap().unwrap();
        assert!(state.enabled);
        assert_eq!(state.trace.last().unwrap().event_type, EventType::Enabled);
    }

    #[test]
    fn test_enable_clears_failure_counter() {
        let (cmd, store) = command();
        let mut state = EngineState::new();
        state.enabled = false;
        state.consecutive_failures = 3;
        store.save_engine(&state).unwrap();

        cmd.run(true, &ControlOptions::default());

        assert_eq!(store.load_engine().unwrap().unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_enable_when_already_enabled_reports_unchanged() {
        let (cmd, _store) = command();
        let options = ControlOptions::default();
        let output = cmd.run(true, &options);

        assert!(output.success);
        assert!(!output.changed);
        assert_eq!(
            cmd.format_output(&output, &options),
            "Growth cycle already enabled.\n"
        );
    }
}
