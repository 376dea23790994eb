//! Status command for Prospector.
//!
//! Shows the persisted engine state: enablement, failure counter, cooldown,
//! breaker states, the strategy queue, lead counts, and recent trace events.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::{EngineState, StrategyStatus, TraceEvent};
use crate::error::FailOpen;
use crate::storage::ProspectStore;

/// Options for the status command.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Number of recent trace events to include.
    pub trace: usize,
}

/// Output format for the status command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOutput {
    /// Whether the command was successful.
    pub success: bool,
    pub enabled: bool,
    pub consecutive_failures: u32,
    pub cooldown_remaining_secs: u64,
    pub cycles_run: u64,
    /// Strategy counts keyed by status.
    pub strategies: BTreeMap<String, usize>,
    /// The strategy currently being worked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_strategy: Option<String>,
    /// Breaker states keyed by breaker name.
    pub breakers: BTreeMap<String, String>,
    /// Lead counts keyed by status.
    pub leads: BTreeMap<String, usize>,
    pub trace: Vec<TraceEventInfo>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simplified trace event info for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEventInfo {
    pub timestamp: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&TraceEvent> for TraceEventInfo {
    fn from(event: &TraceEvent) -> Self {
        Self {
            timestamp: event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            event_type: event.event_type.as_str().to_string(),
            details: event.details.clone(),
        }
    }
}

impl StatusOutput {
    fn from_state(state: &EngineState, leads: BTreeMap<String, usize>, trace: usize) -> Self {
        let snapshot = state.snapshot(Utc::now());

        let mut strategies = BTreeMap::new();
        for status in [
            StrategyStatus::Pending,
            StrategyStatus::Active,
            StrategyStatus::Completed,
            StrategyStatus::Failed,
        ] {
            strategies.insert(
                status.as_str().to_string(),
                state.count_with_status(status),
            );
        }

        Self {
            success: true,
            enabled: snapshot.enabled,
            consecutive_failures: snapshot.consecutive_failures,
            cooldown_remaining_secs: snapshot.cooldown_remaining_secs,
            cycles_run: state.cycles_run,
            strategies,
            active_strategy: state.active_strategy().map(|s| s.history_line()),
            breakers: snapshot
                .breaker_status
                .iter()
                .map(|(key, b)| (key.clone(), b.state.as_str().to_string()))
                .collect(),
            leads,
            trace: state.recent_trace(trace).iter().map(TraceEventInfo::from).collect(),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            enabled: false,
            consecutive_failures: 0,
            cooldown_remaining_secs: 0,
            cycles_run: 0,
            strategies: BTreeMap::new(),
            active_strategy: None,
            breakers: BTreeMap::new(),
            leads: BTreeMap::new(),
            trace: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The status command implementation.
pub struct StatusCommand<S: ProspectStore> {
    store: S,
}

impl<S: ProspectStore> StatusCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run the status command.
    pub fn run(&self, options: &StatusOptions) -> StatusOutput {
        // A missing or unreadable engine file reads as a fresh engine.
        let state = self
            .store
            .load_engine()
            .fail_open_default("loading engine state")
            .unwrap_or_default();

        let leads = match self.store.list_leads() {
            Ok(leads) => leads,
            Err(e) => return StatusOutput::failure(format!("Failed to list leads: {}", e)),
        };
        let mut counts = BTreeMap::new();
        for lead in &leads {
            *counts.entry(lead.status.as_str().to_string()).or_insert(0) += 1;
        }

        StatusOutput::from_state(&state, counts, options.trace)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatusOutput, options: &StatusOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StatusOutput) -> String {
        if !output.success {
            return format!(
                "Status failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        lines.push(format!(
            "Engine: {}",
            if output.enabled { "enabled" } else { "DISABLED" }
        ));
        lines.push(format!("Cycles run: {}", output.cycles_run));
        lines.push(format!(
            "Consecutive failures: {}",
            output.consecutive_failures
        ));
        if output.cooldown_remaining_secs > 0 {
            lines.push(format!(
                "Cooling down: {}s remaining",
                output.cooldown_remaining_secs
            ));
        }

        let strategies: Vec<String> = output
            .strategies
            .iter()
            .map(|(status, count)| format!("{} {}", count, status))
            .collect();
        lines.push(format!("Strategies: {}", strategies.join(", ")));
        if let Some(active) = &output.active_strategy {
            lines.push(format!("Active: {}", active));
        }

        if !output.breakers.is_empty() {
            let breakers: Vec<String> = output
                .breakers
                .iter()
                .map(|(key, state)| format!("{}={}", key, state))
                .collect();
            lines.push(format!("Breakers: {}", breakers.join(", ")));
        }

        if output.leads.is_empty() {
            lines.push("Leads: none".to_string());
        } else {
            let leads: Vec<String> = output
                .leads
                .iter()
                .map(|(status, count)| format!("{} {}", count, status))
                .collect();
            lines.push(format!("Leads: {}", leads.join(", ")));
        }

        if !output.trace.is_empty() {
            lines.push(String::new());
            lines.push("Recent events:".to_string());
            for event in &output.trace {
                let details = event
                    .details
                    .as_ref()
                    .map(|d| format!(" - {}", d))
                    .unwrap_or_default();
                lines.push(format!("  [{}] {}{}", event.timestamp, event.event_type, details));
            }
        }

        lines.join("\n") + "\n"
    }
}
