//! Leads command for Prospector.
//!
//! Lists stored leads and records outreach progress.

use serde::{Deserialize, Serialize};

use crate::core::{Lead, LeadStatus};
use crate::error::{ProspectorError, Result};
use crate::storage::ProspectStore;

/// Options for the leads command.
#[derive(Debug, Clone, Default)]
pub struct LeadsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum number of leads to list.
    pub limit: Option<usize>,
}

/// Outreach transitions an operator can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachMark {
    Contacted,
    Opened,
}

/// Actions available in the leads command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadsAction {
    /// List leads, oldest first, optionally filtered by status name.
    List { status: Option<String> },
    /// Move a lead along the outreach lifecycle.
    Mark { lead_id: String, mark: OutreachMark },
}

/// Output format for the leads command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadsOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// The action performed.
    pub action: String,
    /// Leads listed, or the lead marked.
    pub leads: Vec<LeadInfo>,
    /// Matching leads before the limit was applied.
    pub total: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadInfo {
    pub id: String,
    pub name: String,
    pub website: String,
    pub status: String,
    pub research_quality: u8,
    pub found_via: String,
    /// Facts the last analysis could not find.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_data: Vec<String>,
}

impl From<&Lead> for LeadInfo {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id.clone(),
            name: lead.name.clone(),
            website: lead.website.clone(),
            status: lead.status.as_str().to_string(),
            research_quality: lead.research_quality,
            found_via: lead.found_via.clone(),
            missing_data: lead
                .analysis
                .as_ref()
                .map(|a| a.missing_data.clone())
                .unwrap_or_default(),
        }
    }
}

impl LeadsOutput {
    pub fn success(action: &str, leads: Vec<LeadInfo>, total: usize) -> Self {
        Self {
            success: true,
            action: action.to_string(),
            leads,
            total,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(action: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.to_string(),
            leads: Vec::new(),
            total: 0,
            error: Some(error.into()),
        }
    }
}

/// The leads command implementation.
pub struct LeadsCommand<S: ProspectStore> {
    store: S,
}

impl<S: ProspectStore> LeadsCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run the leads command.
    pub fn run(&self, action: &LeadsAction, options: &LeadsOptions) -> LeadsOutput {
        match action {
            LeadsAction::List { status } => self
                .list(status.as_deref(), options.limit)
                .unwrap_or_else(|e| LeadsOutput::failure("list", e.to_string())),
            LeadsAction::Mark { lead_id, mark } => self
                .mark(lead_id, *mark)
                .unwrap_or_else(|e| LeadsOutput::failure("mark", e.to_string())),
        }
    }

    fn list(&self, status: Option<&str>, limit: Option<usize>) -> Result<LeadsOutput> {
        let leads = match status {
            Some(name) => {
                let status = LeadStatus::parse(name).ok_or_else(|| {
                    ProspectorError::invalid_state(format!("unknown lead status: {}", name))
                })?;
                self.store.leads_with_status(status)?
            }
            None => self.store.list_leads()?,
        };

        let total = leads.len();
        let mut infos: Vec<LeadInfo> = leads.iter().map(LeadInfo::from).collect();
        if let Some(limit) = limit {
            infos.truncate(limit);
        }
        Ok(LeadsOutput::success("list", infos, total))
    }

    fn mark(&self, lead_id: &str, mark: OutreachMark) -> Result<LeadsOutput> {
        let mut lead = self
            .store
            .get_lead(lead_id)?
            .ok_or_else(|| ProspectorError::invalid_state(format!("lead not found: {}", lead_id)))?;

        match mark {
            OutreachMark::Contacted => lead.mark_contacted()?,
            OutreachMark::Opened => lead.mark_opened()?,
        }
        self.store.put_lead(&lead)?;

        Ok(LeadsOutput::success("mark", vec![LeadInfo::from(&lead)], 1))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &LeadsOutput, options: &LeadsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &LeadsOutput) -> String {
        if !output.success {
            return format!(
                "Leads {} failed: {}\n",
                output.action,
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.action == "mark" {
            return match output.leads.first() {
                Some(lead) => format!("{} is now {}\n", lead.id, lead.status),
                None => "Nothing marked.\n".to_string(),
            };
        }

        if output.leads.is_empty() {
            return "No leads found.\n".to_string();
        }

        let mut lines = Vec::new();
        lines.push(format!("Leads ({}/{})\n", output.leads.len(), output.total));
        for lead in &output.leads {
            lines.push(format!(
                "{} [{}] {} ({}) quality {}",
                lead.id, lead.status, lead.name, lead.website, lead.research_quality
            ));
            if !lead.missing_data.is_empty() {
                lines.push(format!("    missing: {}", lead.missing_data.join(", ")));
            }
        }
        lines.join("\n") + "\n"
    }
}
