//! Offline collaborators replayed from a JSON fixture.
//!
//! Lets the binary drive full growth cycles without network adapters.
//! Fixture layout:
//!
//! ```json
//! {
//!   "plans": [{"sector": "Fintech", "query": "payments startups", "rationale": "..."}],
//!   "sourcing": {"payments startups": {"candidates": [{"name": "Acme", "url": "acme.io"}]}},
//!   "pages": {"https://acme.io": {"success": true, "title": "Acme", "text": "..."}},
//!   "searches": {"Acme news": [{"title": "...", "url": "..."}]},
//!   "analysis": {"Acme": [{"quality_score": 6}, {"quality_score": 9}]},
//!   "default_quality": 4
//! }
//! ```
//!
//! Planning returns only plans not already in the history. Analysis
//! sequences advance per company and repeat their last entry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::StrategyPlan;
use crate::error::{ProspectorError, Result};
use crate::providers::traits::{
    Analyzer, CandidateSource, ScrapeResult, SearchHit, SignalSearch, SiteScraper,
    SourcingResult, StrategyPlanner,
};
use crate::research::Analysis;
use crate::util::read_to_string_limited;

const REPLAY: &str = "replay";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayFixture {
    pub plans: Vec<StrategyPlan>,
    /// Sourcing results keyed by strategy query.
    pub sourcing: HashMap<String, SourcingResult>,
    /// Pages keyed by absolute URL.
    pub pages: HashMap<String, ScrapeResult>,
    /// Search hits keyed by exact query.
    pub searches: HashMap<String, Vec<SearchHit>>,
    /// Analysis sequences keyed by company name.
    pub analysis: HashMap<String, Vec<Analysis>>,
    /// Score for companies without a sequence. Unset means analysis fails.
    pub default_quality: Option<u8>,
}

pub struct ReplayProviders {
    fixture: ReplayFixture,
    cursors: Mutex<HashMap<String, usize>>,
}

impl ReplayProviders {
    pub fn new(fixture: ReplayFixture) -> Self {
        Self {
            fixture,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string_limited(path)?;
        let fixture: ReplayFixture = serde_json::from_str(&content).map_err(|e| {
            ProspectorError::serde(format!("invalid fixture {}: {}", path.display(), e))
        })?;
        Ok(Self::new(fixture))
    }

    pub fn fixture(&self) -> &ReplayFixture {
        &self.fixture
    }

    fn next_analysis(&self, company: &str) -> Option<Analysis> {
        let sequence = self.fixture.analysis.get(company)?;
        let mut cursors = self.cursors.lock().ok()?;
        let cursor = cursors.entry(company.to_string()).or_insert(0);
        let index = (*cursor).min(sequence.len().saturating_sub(1));
        *cursor += 1;
        sequence.get(index).cloned()
    }
}

#[async_trait]
impl CandidateSource for ReplayProviders {
    async fn source(&self, query: &str) -> Result<SourcingResult> {
        let result = self.fixture.sourcing.get(query).cloned().unwrap_or_default();
        debug!(query, candidates = result.candidates.len(), "replayed sourcing");
        Ok(result)
    }

    fn name(&self) -> &str {
        REPLAY
    }
}

#[async_trait]
impl StrategyPlanner for ReplayProviders {
    async fn plan_strategies(&self, history: &[String]) -> Result<Vec<StrategyPlan>> {
        Ok(self
            .fixture
            .plans
            .iter()
            .filter(|plan| {
                let line = format!("{}: {}", plan.sector, plan.query);
                !history.contains(&line)
            })
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        REPLAY
    }
}

#[async_trait]
impl SiteScraper for ReplayProviders {
    async fn scrape_site(&self, url: &str) -> ScrapeResult {
        self.fixture.pages.get(url).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SignalSearch for ReplayProviders {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        Ok(self.fixture.searches.get(query).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Analyzer for ReplayProviders {
    async fn analyze(
        &self,
        _corpus: &str,
        company_name: &str,
        _prior: Option<&Analysis>,
    ) -> Result<Analysis> {
        if let Some(analysis) = self.next_analysis(company_name) {
            return Ok(analysis);
        }
        match self.fixture.default_quality {
            Some(quality) => Ok(Analysis::with_quality(quality)),
            None => Err(ProspectorError::fatal(
                REPLAY,
                format!("no analysis recorded for '{}'", company_name),
            )),
        }
    }

    fn name(&self) -> &str {
        REPLAY
    }
}
