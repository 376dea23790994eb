//! Candidate and lead entity types for Prospector.
//!
//! Candidates are ephemeral sourcing results. A candidate becomes a lead once
//! the admission filter has confirmed its website is not already known.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicU32;

use crate::core::ids::next_daily_id;
use crate::error::{ProspectorError, Result};
use crate::research::{Analysis, ResearchOutcome, ResearchStatus};

static LEAD_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a lead ID (format: `lead_YYYYMMDD_NNNN`).
pub fn generate_lead_id() -> String {
    next_lead_id(std::iter::empty::<&str>())
}

/// Generate a lead ID that sorts after every ID in `taken`.
pub fn next_lead_id<'a>(taken: impl IntoIterator<Item = &'a str>) -> String {
    next_daily_id("lead", 4, &LEAD_COUNTER, taken)
}

/// An unverified sourcing result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl Candidate {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: description.into(),
        }
    }
}

/// Lead lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    /// Admitted, research not started.
    #[default]
    New,
    /// Research in progress (or interrupted).
    Analyzing,
    /// Research reached the qualification threshold.
    Qualified,
    /// Research finished below the threshold or failed.
    Unqualified,
    /// Outreach sent.
    Contacted,
    /// Outreach opened.
    Opened,
}

impl LeadStatus {
    /// Whether research for this lead has not finished yet.
    pub fn is_unfinished(&self) -> bool {
        matches!(self, LeadStatus::New | LeadStatus::Analyzing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Analyzing => "ANALYZING",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Unqualified => "UNQUALIFIED",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Opened => "OPENED",
        }
    }

    /// Parse a status name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "NEW" => Some(LeadStatus::New),
            "ANALYZING" => Some(LeadStatus::Analyzing),
            "QUALIFIED" => Some(LeadStatus::Qualified),
            "UNQUALIFIED" => Some(LeadStatus::Unqualified),
            "CONTACTED" => Some(LeadStatus::Contacted),
            "OPENED" => Some(LeadStatus::Opened),
            _ => None,
        }
    }
}

/// A persisted, deduplicated candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    /// Unique identifier (format: lead_YYYYMMDD_NNNN).
    pub id: String,
    /// Company name.
    pub name: String,
    /// Website as sourced.
    pub website: String,
    /// Sourcing blurb.
    pub description: String,
    /// Current status.
    pub status: LeadStatus,
    /// Best analysis recorded so far.
    pub analysis: Option<Analysis>,
    /// Best research quality recorded so far (0 = none).
    pub research_quality: u8,
    /// ID of the strategy that sourced this lead.
    pub found_via: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Lead {
    /// Promote an admitted candidate.
    pub fn from_candidate(candidate: Candidate, strategy_id: impl Into<String>) -> Self {
        Self::with_id(generate_lead_id(), candidate, strategy_id)
    }

    pub fn with_id(id: String, candidate: Candidate, strategy_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: candidate.name,
            website: candidate.url,
            description: candidate.description,
            status: LeadStatus::New,
            analysis: None,
            research_quality: 0,
            found_via: strategy_id.into(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn start_research(&mut self) {
        self.status = LeadStatus::Analyzing;
        self.touch();
    }

    /// Fold a research outcome into the lead.
    ///
    /// `research_quality` never regresses: the stored analysis is replaced
    /// only by a strictly better one.
    pub fn apply_research(&mut self, outcome: &ResearchOutcome, qualify_min_quality: u8) {
        if let Some(best) = &outcome.best {
            if best.quality > self.research_quality {
                self.research_quality = best.quality;
                self.analysis = Some(best.analysis.clone());
            }
        }

        self.status = match outcome.status {
            ResearchStatus::Failed => LeadStatus::Unqualified,
            _ if self.research_quality >= qualify_min_quality => LeadStatus::Qualified,
            _ => LeadStatus::Unqualified,
        };
        self.touch();
    }

    /// Record that outreach was sent.
    pub fn mark_contacted(&mut self) -> Result<()> {
        if !matches!(self.status, LeadStatus::Qualified | LeadStatus::Unqualified) {
            return Err(ProspectorError::invalid_state(format!(
                "cannot mark lead {} contacted from {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = LeadStatus::Contacted;
        self.touch();
        Ok(())
    }

    /// Record that outreach was opened.
    pub fn mark_opened(&mut self) -> Result<()> {
        if self.status != LeadStatus::Contacted {
            return Err(ProspectorError::invalid_state(format!(
                "cannot mark lead {} opened from {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = LeadStatus::Opened;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
