//! Structured output of the analysis collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MAX_QUALITY;

/// Insights extracted from a research corpus, with a 1-10 quality score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    /// How much verifiable, citation-backed insight the corpus supports.
    pub quality_score: u8,
    /// Free-form insight fields (pain points, hiring signals, leadership).
    #[serde(default)]
    pub insights: BTreeMap<String, serde_json::Value>,
    /// Facts the analyzer looked for and could not find.
    #[serde(default)]
    pub missing_data: Vec<String>,
}

impl Analysis {
    pub fn with_quality(quality_score: u8) -> Self {
        Self {
            quality_score,
            ..Self::default()
        }
    }

    /// Score pinned to the 1-10 scale. Collaborators occasionally report 0
    /// or out-of-range values.
    pub fn bounded_quality(&self) -> u8 {
        self.quality_score.clamp(1, MAX_QUALITY)
    }
}
