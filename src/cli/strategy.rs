//! Strategy command for Prospector.
//!
//! Lists the strategy queue and enqueues operator-supplied strategies.
//! Mutations act on the persisted engine state, so they are meant for when
//! no `run` process is holding it.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::core::{
    StrategyBoard, StrategyNode, StrategyOrigin, StrategyPlan, StrategyStatus,
};
use crate::error::{ProspectorError, Result};
use crate::storage::ProspectStore;

/// Options for the strategy command.
#[derive(Debug, Clone, Default)]
pub struct StrategyOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Actions available in the strategy command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyAction {
    /// Enqueue a manual strategy.
    Add(StrategyPlan),
    /// List strategies, optionally filtered by status name.
    List { status: Option<String> },
}

/// Output format for the strategy command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// The action performed.
    pub action: String,
    /// ID of the strategy added, for `add`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<String>,
    pub strategies: Vec<StrategyInfo>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub id: String,
    pub sector: String,
    pub query: String,
    pub status: String,
    pub origin: String,
    pub leads_created: u32,
    pub created_at: String,
}

impl From<&StrategyNode> for StrategyInfo {
    fn from(node: &StrategyNode) -> Self {
        Self {
            id: node.id.clone(),
            sector: node.sector.clone(),
            query: node.query.clone(),
            status: node.status.as_str().to_string(),
            origin: match node.origin {
                StrategyOrigin::Planned => "planned".to_string(),
                StrategyOrigin::Manual => "manual".to_string(),
            },
            leads_created: node.leads_created,
            created_at: node.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl StrategyOutput {
    pub fn added(id: String, strategy: StrategyInfo) -> Self {
        Self {
            success: true,
            action: "add".to_string(),
            added: Some(id),
            strategies: vec![strategy],
            error: None,
        }
    }

    pub fn list(strategies: Vec<StrategyInfo>) -> Self {
        Self {
            success: true,
            action: "list".to_string(),
            added: None,
            strategies,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(action: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.to_string(),
            added: None,
            strategies: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The strategy command implementation.
pub struct StrategyCommand<S: ProspectStore> {
    store: S,
    config: SchedulerConfig,
}

impl<S: ProspectStore> StrategyCommand<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Run the strategy command.
    pub fn run(&self, action: &StrategyAction, _options: &StrategyOptions) -> StrategyOutput {
        match action {
            StrategyAction::Add(plan) => match self.add(plan.clone()) {
                Ok(output) => output,
                Err(e) => StrategyOutput::failure("add", e.to_string()),
            },
            StrategyAction::List { status } => match self.list(status.as_deref()) {
                Ok(output) => output,
                Err(e) => StrategyOutput::failure("list", e.to_string()),
            },
        }
    }

    fn add(&self, plan: StrategyPlan) -> Result<StrategyOutput> {
        let mut state = self.store.load_engine()?.unwrap_or_default();
        let plan = StrategyPlan::new(plan.sector.trim(), plan.query.trim(), plan.rationale);

        let id = StrategyBoard::new(&mut state, &self.config).enqueue_manual(plan)?;
        self.store.save_engine(&state)?;

        let info = state
            .strategy(&id)
            .map(StrategyInfo::from)
            .ok_or_else(|| ProspectorError::invalid_state("strategy vanished"))?;
        Ok(StrategyOutput::added(id, info))
    }

    fn list(&self, status: Option<&str>) -> Result<StrategyOutput> {
        let filter = match status {
            Some(name) => Some(parse_status(name).ok_or_else(|| {
                ProspectorError::invalid_state(format!(
                    "unknown strategy status: {}",
                    name
                ))
            })?),
            None => None,
        };

        let state = self.store.load_engine()?.unwrap_or_default();
        let strategies = state
            .strategies
            .iter()
            .filter(|s| filter.is_none_or(|f| s.status == f))
            .map(StrategyInfo::from)
            .collect();
        Ok(StrategyOutput::list(strategies))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StrategyOutput, options: &StrategyOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StrategyOutput) -> String {
        if !output.success {
            return format!(
                "Strategy {} failed: {}\n",
                output.action,
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(id) = &output.added {
            return format!("Enqueued strategy {}\n", id);
        }

        if output.strategies.is_empty() {
            return "No strategies.\n".to_string();
        }

        let mut lines = Vec::new();
        for s in &output.strategies {
            lines.push(format!(
                "{} [{}] {}: {} ({}, {} leads)",
                s.id, s.status, s.sector, s.query, s.origin, s.leads_created
            ));
        }
        lines.join("\n") + "\n"
    }
}

fn parse_status(name: &str) -> Option<StrategyStatus> {
    match name.to_ascii_lowercase().as_str() {
        "pending" => Some(StrategyStatus::Pending),
        "active" => Some(StrategyStatus::Active),
        "completed" => Some(StrategyStatus::Completed),
        "failed" => Some(StrategyStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryProspectStore;
    use std::sync::Arc;

    fn command() -> (StrategyCommand<Arc<MemoryProspectStore>>, Arc<MemoryProspectStore>) {
        let store = Arc::new(MemoryProspectStore::new());
        (
            StrategyCommand::new(Arc::clone(&store), SchedulerConfig::default()),
            store,
        )
    }

    fn add(sector: &str, query: &str) -> StrategyAction {
        StrategyAction::Add(StrategyPlan::new(sector, query, "operator pick"))
    }

    #[test]
    fn test_add_persists_manual_strategy() {
        let (cmd, store) = command();

        let output = cmd.run(&add("Fintech", "  payments startups "), &StrategyOptions::default());

        assert!(output.success);
        let id = output.added.unwrap();
        let state = store.load_engine().unwrap().unwrap();
        let node = state.strategy(&id).unwrap();
        assert_eq!(node.query, "payments startups");
        assert_eq!(node.origin, StrategyOrigin::Manual);
        assert_eq!(node.status, StrategyStatus::Pending);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let (cmd, _store) = command();
        let options = StrategyOptions::default();
        assert!(cmd.run(&add("Fintech", "payments"), &options).success);

        let output = cmd.run(&add("Fintech", "PAYMENTS"), &options);

        assert!(!output.success);
        assert_eq!(output.action, "add");
        assert!(output.error.is_some());
    }

    #[test]
    fn test_add_blank_query_fails() {
        let (cmd, store) = command();

        let output = cmd.run(&add("Fintech", "   "), &StrategyOptions::default());

        assert!(!output.success);
        assert!(store.load_engine().unwrap().is_none());
    }

    #[test]
    fn test_list_filters_by_status() {
        let (cmd, store) = command();
        let options = StrategyOptions::default();
        cmd.run(&add("A", "one"), &options);
        cmd.run(&add("B", "two"), &options);

        let mut state = store.load_engine().unwrap().unwrap();
        state.strategies[0].status = StrategyStatus::Completed;
        store.save_engine(&state).unwrap();

        let all = cmd.run(&StrategyAction::List { status: None }, &options);
        assert_eq!(all.strategies.len(), 2);

        let pending = cmd.run(
            &StrategyAction::List {
                status: Some("PENDING".to_string()),
            },
            &options,
        );
        assert_eq!(pending.strategies.len(), 1);
        assert_eq!(pending.strategies[0].query, "two");
    }

    #[test]
    fn test_list_unknown_status_fails() {
        let (cmd, _store) = command();
        let output = cmd.run(
            &StrategyAction::List {
                status: Some("paused".to_string()),
            },
            &StrategyOptions::default(),
        );
        assert!(!output.success);
    }

    #[test]
    fn test_format_human_readable() {
        let (cmd, _store) = command();
        let options = StrategyOptions::default();
        cmd.run(&add("Fintech", "payments"), &options);

        let output = cmd.run(&StrategyAction::List { status: None }, &options);
        let formatted = cmd.format_output(&output, &options);
        assert!(formatted.contains("[pending] Fintech: payments (manual, 0 leads)"));

        let empty = StrategyOutput::list(Vec::new());
        assert_eq!(cmd.format_output(&empty, &options), "No strategies.\n");
    }
}
